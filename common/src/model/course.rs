use crate::model::email::EmailType;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Partner-dance role a course is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Leader,
    Follower,
    Solo,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::Leader => "Leader",
            Role::Follower => "Follower",
            Role::Solo => "Solo",
        };
        f.write_str(label)
    }
}

/// A single course offering inside an event.
///
/// `code` doubles as the payment tab title and as the join key inside
/// generated formulas, so it must be unique within the event. A product
/// discriminator for other offering kinds (t-shirts and the like) used to
/// hang off this type; only courses ever reach the engine, so the variant
/// point stays collapsed into this one concrete struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub code: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(default)]
    pub day_of_week: String,
    pub time: NaiveTime,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub additional_comment: String,
    #[serde(default)]
    pub is_solo: bool,
    #[serde(default)]
    pub is_shorter: bool,
    #[serde(default)]
    pub role: Option<Role>,
    /// Resolved during extraction from the per-course summary columns;
    /// never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EmailType>,
    /// Free-text note organizers attach in the registration tab, picked up
    /// during the extraction commentary pass.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email_commentary: String,
}

impl Course {
    /// "HH:MM" form used in rendered emails.
    pub fn formatted_time(&self) -> String {
        self.time.format("%H:%M").to_string()
    }
}
