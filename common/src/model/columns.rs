use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Column-letter assignments for one sheet layout.
///
/// Every event carries two of these: one describing the raw intake tab
/// (filled by the external registration form) and one describing the
/// normalized registration tab the engine maintains. Letters are plain
/// spreadsheet column references ("A".."ZZ"); optional columns may be left
/// empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnLayout {
    #[serde(default)]
    pub date_time: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub course: String,
    pub role: String,
    pub partner: String,
    pub installment: String,
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub accepted: String,
}

/// A column letter is valid when it is empty (optional column) or one to
/// two ASCII letters, i.e. nothing past "ZZ".
pub fn is_valid_column(letters: &str) -> bool {
    let trimmed = letters.trim();
    trimmed.is_empty()
        || (trimmed.len() <= 2 && trimmed.chars().all(|c| c.is_ascii_alphabetic()))
}

impl ColumnLayout {
    fn fields(&self) -> [(&'static str, &str, bool); 11] {
        [
            ("date_time", &self.date_time, false),
            ("email", &self.email, true),
            ("first_name", &self.first_name, true),
            ("last_name", &self.last_name, true),
            ("phone_number", &self.phone_number, true),
            ("course", &self.course, true),
            ("role", &self.role, true),
            ("partner", &self.partner, true),
            ("installment", &self.installment, true),
            ("login", &self.login, false),
            ("accepted", &self.accepted, false),
        ]
    }

    /// Field-level validation messages keyed by field name.
    ///
    /// An empty map means the layout is valid. Saving is blocked while any
    /// message is present.
    pub fn validate(&self) -> BTreeMap<String, String> {
        let mut errors = BTreeMap::new();
        for (field, value, required) in self.fields() {
            if required && value.trim().is_empty() {
                errors.insert(field.to_string(), "column letter is required".to_string());
            } else if !is_valid_column(value) {
                errors.insert(
                    field.to_string(),
                    "must be one or two letters (A..ZZ)".to_string(),
                );
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_layout() -> ColumnLayout {
        ColumnLayout {
            date_time: "A".into(),
            email: "B".into(),
            first_name: "C".into(),
            last_name: "D".into(),
            phone_number: "E".into(),
            course: "F".into(),
            role: "G".into(),
            partner: "H".into(),
            installment: "I".into(),
            login: String::new(),
            accepted: "J".into(),
        }
    }

    #[test]
    fn empty_letters_are_valid_for_optional_columns() {
        assert!(is_valid_column(""));
        assert!(is_valid_column("   "));
    }

    #[test]
    fn letters_past_two_are_rejected() {
        assert!(is_valid_column("ZZ"));
        assert!(!is_valid_column("AAA"));
        assert!(!is_valid_column("A1"));
    }

    #[test]
    fn complete_layout_validates() {
        assert!(complete_layout().validate().is_empty());
    }

    #[test]
    fn missing_required_column_is_reported_by_field() {
        let mut layout = complete_layout();
        layout.email = String::new();
        let errors = layout.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors.contains_key("email"));
    }

    #[test]
    fn malformed_optional_column_is_still_an_error() {
        let mut layout = complete_layout();
        layout.accepted = "J2".into();
        assert!(layout.validate().contains_key("accepted"));
    }
}
