//! Per-invocation context passed into every mutating call.
//!
//! # Responsibility
//! - Tag writes with the caller surface and a frozen action timestamp.
//! - Freeze "now" once per invocation through [`TimeProvider`].
//! - Define the progress reporter callbacks used by long-running runs.
//!
//! # Invariants
//! - No module-scope mutable state: context values are passed explicitly.

use crate::model::entity::EntitySummary;
use jiff::civil::Date;
use jiff::tz::TimeZone;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

/// Caller surface stored verbatim on every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Cli,
    Web,
    GcCron,
    GenCron,
    StatsCron,
}

impl EventSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cli => "cli",
            Self::Web => "web",
            Self::GcCron => "gc_cron",
            Self::GenCron => "gen_cron",
            Self::StatsCron => "stats_cron",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cli" => Some(Self::Cli),
            "web" => Some(Self::Web),
            "gc_cron" => Some(Self::GcCron),
            "gen_cron" => Some(Self::GenCron),
            "stats_cron" => Some(Self::StatsCron),
            _ => None,
        }
    }
}

/// `(event_source, action_timestamp)` pair threaded through writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainContext {
    pub event_source: EventSource,
    pub action_timestamp: Timestamp,
}

impl DomainContext {
    pub fn new(event_source: EventSource, action_timestamp: Timestamp) -> Self {
        Self {
            event_source,
            action_timestamp,
        }
    }

    /// Context stamped with the provider's frozen "now".
    pub fn from_time(event_source: EventSource, time: &TimeProvider) -> Self {
        Self::new(event_source, time.now())
    }
}

/// Clock frozen at construction so one run sees a single "now".
#[derive(Debug, Clone)]
pub struct TimeProvider {
    now: Timestamp,
    timezone: TimeZone,
}

impl TimeProvider {
    /// Freezes the system clock.
    pub fn system(timezone: TimeZone) -> Self {
        Self::frozen(Timestamp::now(), timezone)
    }

    /// Freezes an explicit instant.
    pub fn frozen(now: Timestamp, timezone: TimeZone) -> Self {
        Self { now, timezone }
    }

    /// Freezes "now" at local midday of `date`, so `today()` is `date`.
    pub fn at_date(date: Date, timezone: TimeZone) -> Self {
        let now = date
            .at(12, 0, 0, 0)
            .to_zoned(timezone.clone())
            .map(|zoned| zoned.timestamp())
            .unwrap_or_else(|_| Timestamp::UNIX_EPOCH);
        Self { now, timezone }
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// Local calendar date of the frozen instant.
    pub fn today(&self) -> Date {
        self.now.to_zoned(self.timezone.clone()).date()
    }

    pub fn timezone(&self) -> &TimeZone {
        &self.timezone
    }
}

/// Callbacks for hierarchical progress of a run.
///
/// Implementations may be no-ops; the core never depends on them.
pub trait ProgressReporter {
    fn mark_created(&self, entity: &EntitySummary);
    fn mark_updated(&self, entity: &EntitySummary);
    fn mark_archived(&self, entity: &EntitySummary);
    fn mark_removed(&self, entity: &EntitySummary);
    fn enter_section(&self, name: &str);
    fn exit_section(&self, name: &str);
}

/// Runs `body` inside a named progress section.
pub fn section<R>(reporter: &dyn ProgressReporter, name: &str, body: impl FnOnce() -> R) -> R {
    reporter.enter_section(name);
    let result = body();
    reporter.exit_section(name);
    result
}

/// Reporter that drops every callback.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn mark_created(&self, _entity: &EntitySummary) {}
    fn mark_updated(&self, _entity: &EntitySummary) {}
    fn mark_archived(&self, _entity: &EntitySummary) {}
    fn mark_removed(&self, _entity: &EntitySummary) {}
    fn enter_section(&self, _name: &str) {}
    fn exit_section(&self, _name: &str) {}
}

/// One callback observed by [`RecordingProgressReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Created(EntitySummary),
    Updated(EntitySummary),
    Archived(EntitySummary),
    Removed(EntitySummary),
    EnterSection(String),
    ExitSection(String),
}

/// Reporter that keeps every callback in order.
#[derive(Debug, Default)]
pub struct RecordingProgressReporter {
    events: RefCell<Vec<ProgressEvent>>,
}

impl RecordingProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.borrow().clone()
    }

    /// Entities reported as created, in order.
    pub fn created(&self) -> Vec<EntitySummary> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::Created(summary) => Some(summary.clone()),
                _ => None,
            })
            .collect()
    }

    /// Entities reported as archived, in order.
    pub fn archived(&self) -> Vec<EntitySummary> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::Archived(summary) => Some(summary.clone()),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ProgressEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl ProgressReporter for RecordingProgressReporter {
    fn mark_created(&self, entity: &EntitySummary) {
        self.push(ProgressEvent::Created(entity.clone()));
    }

    fn mark_updated(&self, entity: &EntitySummary) {
        self.push(ProgressEvent::Updated(entity.clone()));
    }

    fn mark_archived(&self, entity: &EntitySummary) {
        self.push(ProgressEvent::Archived(entity.clone()));
    }

    fn mark_removed(&self, entity: &EntitySummary) {
        self.push(ProgressEvent::Removed(entity.clone()));
    }

    fn enter_section(&self, name: &str) {
        self.push(ProgressEvent::EnterSection(name.to_string()));
    }

    fn exit_section(&self, name: &str) {
        self.push(ProgressEvent::ExitSection(name.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::{section, ProgressEvent, RecordingProgressReporter, TimeProvider};
    use jiff::civil::date;
    use jiff::tz::TimeZone;

    #[test]
    fn at_date_freezes_today_in_the_given_timezone() {
        let time = TimeProvider::at_date(date(2024, 12, 2), TimeZone::UTC);
        assert_eq!(time.today(), date(2024, 12, 2));
        assert_eq!(time.now(), time.now());
    }

    #[test]
    fn section_wraps_body_with_enter_and_exit() {
        let reporter = RecordingProgressReporter::new();
        let value = section(&reporter, "habits", || 42);
        assert_eq!(value, 42);
        assert_eq!(
            reporter.events(),
            vec![
                ProgressEvent::EnterSection("habits".to_string()),
                ProgressEvent::ExitSection("habits".to_string()),
            ]
        );
    }
}
