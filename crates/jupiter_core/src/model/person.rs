//! Personal relationship management: persons with catch-up and birthday
//! cadences.

use crate::model::entity::{EntityId, EntityKind, EntityTag};
use crate::model::validation::{normalize_name, InputValidationError, ValidationResult};
use crate::schedule::RecurringTaskGenParams;
use jiff::civil::Date;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonCollection {
    /// Project receiving catch-up and birthday tasks.
    pub catch_up_project_ref_id: EntityId,
}

impl EntityKind for PersonCollection {
    const TAG: EntityTag = EntityTag::PersonCollection;

    fn snippet(&self) -> String {
        "persons".to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonRelationship {
    Family,
    Friend,
    Acquaintance,
    SchoolBuddy,
    Colleague,
    Work,
    Other,
}

/// Day and month of a birthday; the year is irrelevant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonBirthday {
    pub day: u8,
    pub month: u8,
}

impl PersonBirthday {
    pub fn new(day: u8, month: u8) -> ValidationResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(InputValidationError::new("birthday", format!("bad month {month}")));
        }
        // 2024 is a leap year, so 29 February is accepted.
        if Date::new(2024, month as i8, day as i8).is_err() {
            return Err(InputValidationError::new(
                "birthday",
                format!("bad day {day} for month {month}"),
            ));
        }
        Ok(Self { day, month })
    }

    /// Birthday in `year`, moved to 28 February outside leap years.
    pub fn in_year(self, year: i16) -> Date {
        Date::new(year, self.month as i8, self.day as i8)
            .or_else(|_| Date::new(year, self.month as i8, 28))
            .unwrap_or_else(|_| Date::constant(1970, 1, 1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub relationship: PersonRelationship,
    pub catch_up_params: Option<RecurringTaskGenParams>,
    pub birthday: Option<PersonBirthday>,
}

impl Person {
    pub fn new(
        name: &str,
        relationship: PersonRelationship,
        catch_up_params: Option<RecurringTaskGenParams>,
        birthday: Option<PersonBirthday>,
    ) -> ValidationResult<Self> {
        let person = Self {
            name: normalize_name("name", name)?,
            relationship,
            catch_up_params,
            birthday,
        };
        person.validate()?;
        Ok(person)
    }

    pub fn validate(&self) -> ValidationResult<()> {
        match &self.catch_up_params {
            Some(params) => params.validate(),
            None => Ok(()),
        }
    }
}

impl EntityKind for Person {
    const TAG: EntityTag = EntityTag::Person;

    fn snippet(&self) -> String {
        self.name.clone()
    }
}
