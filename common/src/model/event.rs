use crate::model::columns::ColumnLayout;
use crate::model::course::Course;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// The aggregate root: one registration period with its spreadsheet and
/// course list.
///
/// `courses_are_merged` selects the materialization strategy: merged events
/// pack several comma-separated course names into one intake row and need
/// the incremental dedup-append sync, non-merged events expand through
/// plain projection formulas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub courses_are_merged: bool,
    pub spreadsheet_id: String,
    pub raw_columns: ColumnLayout,
    pub registration_columns: ColumnLayout,
    #[serde(default)]
    pub courses: Vec<Course>,
}

impl Event {
    /// Deep copy with a fresh identity, for the "duplicate event" operation.
    /// The caller assigns the definitive id when persisting.
    pub fn duplicate(&self) -> Event {
        Event {
            id: 0,
            name: format!("{} (copy)", self.name),
            ..self.clone()
        }
    }

    /// Field-level validation; layout errors are prefixed with the layout
    /// they belong to. An empty map means the event may be saved.
    pub fn validate(&self) -> BTreeMap<String, String> {
        let mut errors = BTreeMap::new();
        if self.name.trim().is_empty() {
            errors.insert("name".to_string(), "event name is required".to_string());
        }
        if self.spreadsheet_id.trim().is_empty() {
            errors.insert(
                "spreadsheet_id".to_string(),
                "spreadsheet id is required".to_string(),
            );
        }
        for (prefix, layout) in [
            ("raw_columns", &self.raw_columns),
            ("registration_columns", &self.registration_columns),
        ] {
            for (field, message) in layout.validate() {
                errors.insert(format!("{prefix}.{field}"), message);
            }
        }
        // the engine keys every join on these two
        for (field, value) in [
            ("registration_columns.login", &self.registration_columns.login),
            (
                "registration_columns.accepted",
                &self.registration_columns.accepted,
            ),
        ] {
            if value.trim().is_empty() {
                errors
                    .entry(field.to_string())
                    .or_insert_with(|| "column letter is required".to_string());
            }
        }
        let mut codes = HashSet::new();
        for course in &self.courses {
            if course.code.trim().is_empty() {
                errors.insert(
                    format!("courses.{}.code", course.name),
                    "course code is required".to_string(),
                );
            } else if !codes.insert(course.code.clone()) {
                errors.insert(
                    format!("courses.{}.code", course.name),
                    format!("course code {:?} is used twice", course.code),
                );
            }
        }
        errors
    }
}
