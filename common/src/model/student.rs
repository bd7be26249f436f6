use crate::model::course::Course;
use crate::model::email::EmailType;
use serde::{Deserialize, Serialize};

/// A student as reconstructed from the computed summary tab.
///
/// Built fresh on every extraction and never persisted. `id` is the row
/// ordinal within the summary data rows and doubles as the write-back key
/// for sent markers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Student {
    pub id: usize,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Amount still owed, in whole currency units.
    pub payment_amount: i64,
    /// Whether the student opted into paying in installments.
    pub installments: bool,
    /// Enrolled courses, each carrying its resolved status.
    pub courses: Vec<Course>,
    /// Email types already dispatched in earlier batches.
    pub already_sent: Vec<EmailType>,
}

impl Student {
    /// The dedup/join key shared with the registration tab.
    pub fn login(&self) -> String {
        format!("{},{},{}", self.email, self.first_name, self.last_name)
    }

    pub fn has_course_with_status(&self, status: EmailType) -> bool {
        self.courses.iter().any(|c| c.status == Some(status))
    }

    /// Comma-joined names of the courses carrying the given status.
    pub fn merged_course_names(&self, status: EmailType) -> String {
        self.courses
            .iter()
            .filter(|c| c.status == Some(status))
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Bolded commentary block for the `<COMMENTARY/>` tag; empty when no
    /// matching course carries commentary.
    pub fn merged_commentary(&self, status: EmailType) -> String {
        let lines: Vec<&str> = self
            .courses
            .iter()
            .filter(|c| c.status == Some(status) && !c.email_commentary.is_empty())
            .map(|c| c.email_commentary.as_str())
            .collect();
        if lines.is_empty() {
            String::new()
        } else {
            format!("<b><br><br>{}</b>", lines.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn course(name: &str, status: Option<EmailType>, commentary: &str) -> Course {
        Course {
            id: 0,
            name: name.into(),
            code: name[..1].to_string(),
            start: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
            day_of_week: String::new(),
            time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            location: String::new(),
            additional_comment: String::new(),
            is_solo: false,
            is_shorter: false,
            role: None,
            status,
            email_commentary: commentary.into(),
        }
    }

    #[test]
    fn login_joins_email_and_names() {
        let student = Student {
            email: "a@b.com".into(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            ..Default::default()
        };
        assert_eq!(student.login(), "a@b.com,Jane,Doe");
    }

    #[test]
    fn merged_names_filter_by_status() {
        let student = Student {
            courses: vec![
                course("Tango", Some(EmailType::Confirmation), ""),
                course("Salsa", Some(EmailType::WaitingList), ""),
                course("Zouk", Some(EmailType::Confirmation), ""),
            ],
            ..Default::default()
        };
        assert_eq!(
            student.merged_course_names(EmailType::Confirmation),
            "Tango, Zouk"
        );
        assert_eq!(student.merged_course_names(EmailType::FullClass), "");
    }

    #[test]
    fn commentary_is_empty_without_any_note() {
        let student = Student {
            courses: vec![course("Tango", Some(EmailType::Confirmation), "")],
            ..Default::default()
        };
        assert_eq!(student.merged_commentary(EmailType::Confirmation), "");
    }

    #[test]
    fn commentary_joins_noted_courses() {
        let student = Student {
            courses: vec![
                course("Tango", Some(EmailType::Confirmation), "bring shoes"),
                course("Salsa", Some(EmailType::Confirmation), ""),
            ],
            ..Default::default()
        };
        assert_eq!(
            student.merged_commentary(EmailType::Confirmation),
            "<b><br><br>bring shoes</b>"
        );
    }
}
