//! Skip rules deciding which recurrence windows get materialized.
//!
//! # Responsibility
//! - Model every skip variant as one tagged value with one payload.
//! - Validate payloads and (period, variant) compatibility at construction.
//! - Encode to / decode from a stable label used for storage and input.
//!
//! # Invariants
//! - Set payloads are non-empty, duplicate-free, in range and kept sorted.
//! - `should_keep` is pure and never touches the store.

use crate::model::validation::{InputValidationError, ValidationResult};
use crate::schedule::period::{quarter_of, RecurringTaskPeriod};
use jiff::civil::Date;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

static LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<kind>[a-z_]+)(?::(?P<payload>[0-9,:]+))?$").expect("valid skip rule regex")
});

/// Tagged skip rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RecurringTaskSkipRule {
    /// Keep windows with an even ordinal.
    Even,
    /// Keep windows with an odd ordinal.
    Odd,
    /// Keep iff `k <= ordinal` and `(ordinal - k) mod n == 0`.
    EveryNK { n: u32, k: u32 },
    /// ISO weekdays 1..=7 to keep, for daily periods.
    CustomDailyRelWeekly(Vec<u8>),
    /// Days of month 1..=31 to keep, for daily periods.
    CustomDailyRelMonthly(Vec<u8>),
    /// ISO week numbers 1..=53 to keep, for weekly periods.
    CustomWeeklyRelYearly(Vec<u8>),
    /// Months 1..=12 to keep, for monthly periods.
    CustomMonthlyRelYearly(Vec<u8>),
    /// Quarters 1..=4 to keep, for quarterly periods.
    CustomQuarterlyRelYearly(Vec<u8>),
}

impl RecurringTaskSkipRule {
    pub fn every_n_k(n: u32, k: u32) -> ValidationResult<Self> {
        let rule = Self::EveryNK { n, k };
        rule.validate()?;
        Ok(rule)
    }

    pub fn custom_daily_rel_weekly(days: Vec<u8>) -> ValidationResult<Self> {
        Self::CustomDailyRelWeekly(days).normalized()
    }

    pub fn custom_daily_rel_monthly(days: Vec<u8>) -> ValidationResult<Self> {
        Self::CustomDailyRelMonthly(days).normalized()
    }

    pub fn custom_weekly_rel_yearly(weeks: Vec<u8>) -> ValidationResult<Self> {
        Self::CustomWeeklyRelYearly(weeks).normalized()
    }

    pub fn custom_monthly_rel_yearly(months: Vec<u8>) -> ValidationResult<Self> {
        Self::CustomMonthlyRelYearly(months).normalized()
    }

    pub fn custom_quarterly_rel_yearly(quarters: Vec<u8>) -> ValidationResult<Self> {
        Self::CustomQuarterlyRelYearly(quarters).normalized()
    }

    /// Stable variant name, the prefix of the label.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Even => "even",
            Self::Odd => "odd",
            Self::EveryNK { .. } => "every",
            Self::CustomDailyRelWeekly(_) => "custom_daily_rel_weekly",
            Self::CustomDailyRelMonthly(_) => "custom_daily_rel_monthly",
            Self::CustomWeeklyRelYearly(_) => "custom_weekly_rel_yearly",
            Self::CustomMonthlyRelYearly(_) => "custom_monthly_rel_yearly",
            Self::CustomQuarterlyRelYearly(_) => "custom_quarterly_rel_yearly",
        }
    }

    /// Checks payload shape regardless of period.
    pub fn validate(&self) -> ValidationResult<()> {
        match self {
            Self::Even | Self::Odd => Ok(()),
            Self::EveryNK { n, k } => {
                if *n < 1 {
                    return Err(InputValidationError::new("skip_rule", "n must be at least 1"));
                }
                if k >= n {
                    return Err(InputValidationError::new(
                        "skip_rule",
                        format!("k must be in 0..{n}, got {k}"),
                    ));
                }
                Ok(())
            }
            Self::CustomDailyRelWeekly(values) => validate_set(self.kind_name(), values, 7),
            Self::CustomDailyRelMonthly(values) => validate_set(self.kind_name(), values, 31),
            Self::CustomWeeklyRelYearly(values) => validate_set(self.kind_name(), values, 53),
            Self::CustomMonthlyRelYearly(values) => validate_set(self.kind_name(), values, 12),
            Self::CustomQuarterlyRelYearly(values) => validate_set(self.kind_name(), values, 4),
        }
    }

    /// Whether this variant may be attached to `period`.
    pub fn is_compatible_with(&self, period: RecurringTaskPeriod) -> bool {
        match self {
            Self::Even | Self::Odd | Self::EveryNK { .. } => true,
            Self::CustomDailyRelWeekly(_) | Self::CustomDailyRelMonthly(_) => {
                period == RecurringTaskPeriod::Daily
            }
            Self::CustomWeeklyRelYearly(_) => period == RecurringTaskPeriod::Weekly,
            Self::CustomMonthlyRelYearly(_) => period == RecurringTaskPeriod::Monthly,
            Self::CustomQuarterlyRelYearly(_) => period == RecurringTaskPeriod::Quarterly,
        }
    }

    /// Validates payload and compatibility together.
    pub fn validate_for(&self, period: RecurringTaskPeriod) -> ValidationResult<()> {
        self.validate()?;
        if !self.is_compatible_with(period) {
            return Err(InputValidationError::new(
                "skip_rule",
                format!("`{}` cannot be used with a {period} period", self.kind_name()),
            ));
        }
        Ok(())
    }

    /// Decides whether the window starting at `first_day` is materialized.
    pub fn should_keep(&self, period: RecurringTaskPeriod, first_day: Date) -> bool {
        match self {
            Self::Even => period.ordinal(first_day) % 2 == 0,
            Self::Odd => period.ordinal(first_day) % 2 != 0,
            Self::EveryNK { n, k } => {
                let ordinal = period.ordinal(first_day);
                let n = i64::from(*n);
                let k = i64::from(*k);
                k <= ordinal && (ordinal - k) % n == 0
            }
            Self::CustomDailyRelWeekly(days) => {
                contains(days, i64::from(first_day.weekday().to_monday_one_offset()))
            }
            Self::CustomDailyRelMonthly(days) => contains(days, i64::from(first_day.day())),
            Self::CustomWeeklyRelYearly(weeks) => {
                contains(weeks, i64::from(first_day.iso_week_date().week()))
            }
            Self::CustomMonthlyRelYearly(months) => contains(months, i64::from(first_day.month())),
            Self::CustomQuarterlyRelYearly(quarters) => {
                contains(quarters, i64::from(quarter_of(first_day)))
            }
        }
    }

    /// Stable label, e.g. `every:3:1` or `custom_daily_rel_weekly:1,4`.
    pub fn to_label(&self) -> String {
        match self {
            Self::Even | Self::Odd => self.kind_name().to_string(),
            Self::EveryNK { n, k } => format!("every:{n}:{k}"),
            Self::CustomDailyRelWeekly(values)
            | Self::CustomDailyRelMonthly(values)
            | Self::CustomWeeklyRelYearly(values)
            | Self::CustomMonthlyRelYearly(values)
            | Self::CustomQuarterlyRelYearly(values) => {
                let joined = values
                    .iter()
                    .map(u8::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{}:{joined}", self.kind_name())
            }
        }
    }

    /// Parses a label produced by [`RecurringTaskSkipRule::to_label`].
    pub fn from_label(label: &str) -> ValidationResult<Self> {
        let normalized = label.trim().to_ascii_lowercase();
        let captures = LABEL_RE.captures(&normalized).ok_or_else(|| {
            InputValidationError::new("skip_rule", format!("unrecognized skip rule `{label}`"))
        })?;
        let kind = captures.name("kind").map_or("", |m| m.as_str());
        let payload = captures.name("payload").map(|m| m.as_str());

        match (kind, payload) {
            ("even", None) => Ok(Self::Even),
            ("odd", None) => Ok(Self::Odd),
            ("every", Some(payload)) => {
                let (n, k) = payload.split_once(':').ok_or_else(|| {
                    InputValidationError::new("skip_rule", "expected `every:<n>:<k>`")
                })?;
                Self::every_n_k(parse_number(n)?, parse_number(k)?)
            }
            ("custom_daily_rel_weekly", Some(payload)) => {
                Self::custom_daily_rel_weekly(parse_set(payload)?)
            }
            ("custom_daily_rel_monthly", Some(payload)) => {
                Self::custom_daily_rel_monthly(parse_set(payload)?)
            }
            ("custom_weekly_rel_yearly", Some(payload)) => {
                Self::custom_weekly_rel_yearly(parse_set(payload)?)
            }
            ("custom_monthly_rel_yearly", Some(payload)) => {
                Self::custom_monthly_rel_yearly(parse_set(payload)?)
            }
            ("custom_quarterly_rel_yearly", Some(payload)) => {
                Self::custom_quarterly_rel_yearly(parse_set(payload)?)
            }
            _ => Err(InputValidationError::new(
                "skip_rule",
                format!("unrecognized skip rule `{label}`"),
            )),
        }
    }

    fn normalized(self) -> ValidationResult<Self> {
        self.validate()?;
        Ok(match self {
            Self::CustomDailyRelWeekly(values) => Self::CustomDailyRelWeekly(sorted(values)),
            Self::CustomDailyRelMonthly(values) => Self::CustomDailyRelMonthly(sorted(values)),
            Self::CustomWeeklyRelYearly(values) => Self::CustomWeeklyRelYearly(sorted(values)),
            Self::CustomMonthlyRelYearly(values) => Self::CustomMonthlyRelYearly(sorted(values)),
            Self::CustomQuarterlyRelYearly(values) => {
                Self::CustomQuarterlyRelYearly(sorted(values))
            }
            other => other,
        })
    }
}

impl Display for RecurringTaskSkipRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_label())
    }
}

impl From<RecurringTaskSkipRule> for String {
    fn from(value: RecurringTaskSkipRule) -> Self {
        value.to_label()
    }
}

impl TryFrom<String> for RecurringTaskSkipRule {
    type Error = InputValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_label(&value)
    }
}

fn validate_set(kind: &str, values: &[u8], max: u8) -> ValidationResult<()> {
    if values.is_empty() {
        return Err(InputValidationError::new(
            "skip_rule",
            format!("`{kind}` needs at least one value"),
        ));
    }
    let mut seen = [false; 54];
    for value in values {
        if *value < 1 || *value > max {
            return Err(InputValidationError::new(
                "skip_rule",
                format!("`{kind}` values must be in 1..={max}, got {value}"),
            ));
        }
        let slot = usize::from(*value);
        if seen[slot] {
            return Err(InputValidationError::new(
                "skip_rule",
                format!("`{kind}` repeats value {value}"),
            ));
        }
        seen[slot] = true;
    }
    Ok(())
}

fn contains(values: &[u8], needle: i64) -> bool {
    values.iter().any(|value| i64::from(*value) == needle)
}

fn sorted(mut values: Vec<u8>) -> Vec<u8> {
    values.sort_unstable();
    values
}

fn parse_number(value: &str) -> ValidationResult<u32> {
    value.parse::<u32>().map_err(|_| {
        InputValidationError::new("skip_rule", format!("`{value}` is not a number"))
    })
}

fn parse_set(payload: &str) -> ValidationResult<Vec<u8>> {
    payload
        .split(',')
        .map(|item| {
            item.parse::<u8>().map_err(|_| {
                InputValidationError::new("skip_rule", format!("`{item}` is not a small number"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::RecurringTaskSkipRule;
    use crate::schedule::period::RecurringTaskPeriod;
    use jiff::civil::date;

    #[test]
    fn custom_daily_rel_weekly_keeps_listed_weekdays() {
        let rule = RecurringTaskSkipRule::custom_daily_rel_weekly(vec![4, 1]).unwrap();
        let daily = RecurringTaskPeriod::Daily;
        assert!(rule.should_keep(daily, date(2024, 12, 2)));
        assert!(!rule.should_keep(daily, date(2024, 12, 3)));
        assert!(rule.should_keep(daily, date(2024, 12, 5)));
    }

    #[test]
    fn every_n_k_skips_ordinals_before_k() {
        let rule = RecurringTaskSkipRule::every_n_k(3, 1).unwrap();
        let monthly = RecurringTaskPeriod::Monthly;
        assert!(rule.should_keep(monthly, date(2024, 1, 1)));
        assert!(!rule.should_keep(monthly, date(2024, 2, 1)));
        assert!(rule.should_keep(monthly, date(2024, 4, 1)));

        let late = RecurringTaskSkipRule::every_n_k(5, 4).unwrap();
        assert!(!rule.should_keep(monthly, date(2024, 3, 1)));
        assert!(!late.should_keep(monthly, date(2024, 3, 1)));
        assert!(late.should_keep(monthly, date(2024, 4, 1)));
    }

    #[test]
    fn even_and_odd_use_week_numbers_for_weekly() {
        let weekly = RecurringTaskPeriod::Weekly;
        // 2024-12-02 is in ISO week 49.
        assert!(RecurringTaskSkipRule::Odd.should_keep(weekly, date(2024, 12, 2)));
        assert!(!RecurringTaskSkipRule::Even.should_keep(weekly, date(2024, 12, 2)));
    }

    #[test]
    fn malformed_payloads_are_rejected() {
        assert!(RecurringTaskSkipRule::every_n_k(0, 0).is_err());
        assert!(RecurringTaskSkipRule::every_n_k(2, 2).is_err());
        assert!(RecurringTaskSkipRule::custom_daily_rel_weekly(vec![]).is_err());
        assert!(RecurringTaskSkipRule::custom_daily_rel_weekly(vec![8]).is_err());
        assert!(RecurringTaskSkipRule::custom_daily_rel_weekly(vec![1, 1]).is_err());
        assert!(RecurringTaskSkipRule::custom_quarterly_rel_yearly(vec![0]).is_err());
    }

    #[test]
    fn incompatible_period_is_rejected() {
        let rule = RecurringTaskSkipRule::custom_weekly_rel_yearly(vec![1, 2]).unwrap();
        assert!(rule.validate_for(RecurringTaskPeriod::Weekly).is_ok());
        assert!(rule.validate_for(RecurringTaskPeriod::Daily).is_err());
        assert!(RecurringTaskSkipRule::Even
            .validate_for(RecurringTaskPeriod::Yearly)
            .is_ok());
    }

    #[test]
    fn labels_decode_back_to_the_same_rule() {
        let rules = vec![
            RecurringTaskSkipRule::Even,
            RecurringTaskSkipRule::Odd,
            RecurringTaskSkipRule::every_n_k(4, 3).unwrap(),
            RecurringTaskSkipRule::custom_daily_rel_weekly(vec![7, 1, 4]).unwrap(),
            RecurringTaskSkipRule::custom_daily_rel_monthly(vec![31]).unwrap(),
            RecurringTaskSkipRule::custom_weekly_rel_yearly(vec![53, 1]).unwrap(),
            RecurringTaskSkipRule::custom_monthly_rel_yearly(vec![12]).unwrap(),
            RecurringTaskSkipRule::custom_quarterly_rel_yearly(vec![2, 4]).unwrap(),
        ];
        for rule in rules {
            let decoded = RecurringTaskSkipRule::from_label(&rule.to_label()).unwrap();
            assert_eq!(decoded, rule);
        }
        assert_eq!(
            RecurringTaskSkipRule::custom_daily_rel_weekly(vec![4, 1])
                .unwrap()
                .to_label(),
            "custom_daily_rel_weekly:1,4"
        );
    }

    #[test]
    fn serde_uses_the_label() {
        let rule = RecurringTaskSkipRule::every_n_k(2, 1).unwrap();
        let json = serde_json::to_string(&rule).unwrap();
        assert_eq!(json, "\"every:2:1\"");
        let back: RecurringTaskSkipRule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rule);
        assert!(serde_json::from_str::<RecurringTaskSkipRule>("\"every:2:5\"").is_err());
    }
}
