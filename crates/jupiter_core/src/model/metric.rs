//! Metrics: a branch entity owning timestamped value entries.

use crate::model::entity::{EntityId, EntityKind, EntityTag};
use crate::model::validation::{normalize_name, InputValidationError, ValidationResult};
use crate::schedule::RecurringTaskGenParams;
use jiff::civil::Date;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricCollection {
    /// Project receiving "Collect value for metric ..." tasks.
    pub collection_project_ref_id: EntityId,
}

impl EntityKind for MetricCollection {
    const TAG: EntityTag = EntityTag::MetricCollection;

    fn snippet(&self) -> String {
        "metrics".to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricUnit {
    Count,
    Money,
    Weight,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    /// Collection cadence; `None` means the metric generates no tasks.
    pub collection_params: Option<RecurringTaskGenParams>,
    pub unit: Option<MetricUnit>,
    pub icon: Option<String>,
}

impl Metric {
    pub fn new(
        name: &str,
        collection_params: Option<RecurringTaskGenParams>,
        unit: Option<MetricUnit>,
        icon: Option<String>,
    ) -> ValidationResult<Self> {
        let metric = Self {
            name: normalize_name("name", name)?,
            collection_params,
            unit,
            icon: icon.map(|icon| icon.trim().to_string()).filter(|icon| !icon.is_empty()),
        };
        metric.validate()?;
        Ok(metric)
    }

    pub fn validate(&self) -> ValidationResult<()> {
        match &self.collection_params {
            Some(params) => params.validate(),
            None => Ok(()),
        }
    }
}

impl EntityKind for Metric {
    const TAG: EntityTag = EntityTag::Metric;

    fn snippet(&self) -> String {
        self.name.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEntry {
    pub collection_time: Date,
    pub value: f64,
    pub notes: Option<String>,
}

impl MetricEntry {
    pub fn new(collection_time: Date, value: f64, notes: Option<String>) -> ValidationResult<Self> {
        if !value.is_finite() {
            return Err(InputValidationError::new("value", "must be a finite number"));
        }
        Ok(Self {
            collection_time,
            value,
            notes,
        })
    }
}

impl EntityKind for MetricEntry {
    const TAG: EntityTag = EntityTag::MetricEntry;

    fn snippet(&self) -> String {
        format!("{} @ {}", self.value, self.collection_time)
    }
}
