//! Student extraction.
//!
//! Reads the computed summary tab back into typed `Student` records. All
//! column positions are resolved by header text through `HeaderIndex` —
//! never by fixed letters — because the summary layout is derived
//! positionally at synthesis time and shifts with the course count. A
//! second pass joins the registration tab on (login, course) to pick up
//! the per-course commentary organizers left for the resolved status.

use super::client::{with_rate_limit_retry, SheetsError};
use super::{Engine, SUMMARY_FIRST_DATA_ROW};
use common::model::course::Course;
use common::model::email::EmailType;
use common::model::student::Student;
use std::collections::HashMap;

/// Label → 0-based column position, built once per read from a header row.
///
/// Matching is case-insensitive and collapses newlines to spaces, so the
/// wrapped "Installment\nSum" header resolves as "Installment Sum".
pub struct HeaderIndex {
    map: HashMap<String, usize>,
}

fn normalize(label: &str) -> String {
    label.replace('\n', " ").trim().to_lowercase()
}

impl HeaderIndex {
    pub fn from_row(row: &[String]) -> Self {
        let mut map = HashMap::new();
        for (i, cell) in row.iter().enumerate() {
            let key = normalize(cell);
            if !key.is_empty() {
                map.entry(key).or_insert(i);
            }
        }
        HeaderIndex { map }
    }

    pub fn get(&self, label: &str) -> Option<usize> {
        self.map.get(&normalize(label)).copied()
    }

    pub fn require(&self, label: &str) -> Result<usize, SheetsError> {
        self.get(label).ok_or_else(|| {
            SheetsError::InvalidResponse(format!("header {label:?} not found"))
        })
    }
}

fn cell_text(row: &[String], index: usize) -> &str {
    row.get(index).map(String::as_str).unwrap_or("")
}

/// Course-code columns of the summary tab, from the stacked-code row read
/// starting at column B. The scan stops at the first empty cell or at the
/// Sum block; the attendance-sum cells that follow the codes are numeric
/// and slip through, but they match no configured course and fall out in
/// the join below.
pub(crate) fn course_code_columns(code_row: &[String]) -> Vec<(String, usize)> {
    let mut columns = Vec::new();
    for (i, raw) in code_row.iter().enumerate() {
        let code = raw.replace('\n', "");
        let trimmed = code.trim();
        if trimmed.is_empty() || trimmed.to_lowercase().starts_with("sum") {
            break;
        }
        // +1 because the read range starts at column B
        columns.push((trimmed.to_string(), i + 1));
    }
    columns
}

/// Strips the currency decoration from a money cell ("1 200 zł" → 1200).
fn parse_amount(value: &str) -> i64 {
    value
        .replace(" zł", "")
        .replace([' ', '\u{a0}'], "")
        .parse()
        .unwrap_or(0)
}

/// Builds students out of the summary data rows. Rows without an email and
/// students without a single matched course are dropped; a course name
/// that matches nothing configured is an intentional filter, not an error.
pub(crate) fn parse_students(
    rows: &[Vec<String>],
    headers: &HeaderIndex,
    course_columns: &[(String, usize)],
    configured: &[Course],
) -> Result<Vec<Student>, SheetsError> {
    let email_idx = headers.require("Email")?;
    let first_name_idx = headers.require("First Name")?;
    let last_name_idx = headers.require("Last Name")?;
    let installment_idx = headers.require("Installment")?;
    let courses_idx = headers.require("Courses")?;
    let owed_idx = headers.require("Need to be Paid")?;
    let marker_idx: Vec<(EmailType, Option<usize>)> = EmailType::CONCRETE
        .iter()
        .map(|&t| (t, headers.get(t.column_header())))
        .collect();

    let mut students = Vec::new();
    for (row_id, row) in rows.iter().enumerate() {
        let email = cell_text(row, email_idx).trim();
        if email.is_empty() {
            continue;
        }

        let names: Vec<String> = cell_text(row, courses_idx)
            .split(',')
            .map(|name| name.trim().to_lowercase())
            .filter(|name| !name.is_empty())
            .collect();
        let mut courses: Vec<Course> = configured
            .iter()
            .filter(|course| {
                let lowered = course.name.to_lowercase();
                names.iter().any(|name| name.contains(&lowered))
            })
            .cloned()
            .map(|mut course| {
                course.status = None;
                course.email_commentary = String::new();
                course
            })
            .collect();
        if courses.is_empty() {
            continue;
        }

        for (code, position) in course_columns {
            if let Some(course) = courses.iter_mut().find(|c| &c.code == code) {
                course.status = EmailType::from_status_letter(cell_text(row, *position));
            }
        }

        let already_sent = marker_idx
            .iter()
            .filter_map(|&(t, idx)| {
                let i = idx?;
                (!cell_text(row, i).trim().is_empty()).then_some(t)
            })
            .collect();

        students.push(Student {
            id: row_id,
            email: email.to_string(),
            first_name: cell_text(row, first_name_idx).trim().to_string(),
            last_name: cell_text(row, last_name_idx).trim().to_string(),
            payment_amount: parse_amount(cell_text(row, owed_idx)),
            installments: cell_text(row, installment_idx).trim() == "1",
            courses,
            already_sent,
        });
    }
    Ok(students)
}

/// Joins the registration rows on (login, course name) — both lowered —
/// and attaches the commentary column matching each course's resolved
/// status. Rows missing login, course or the accepted flag do not take
/// part in the join.
pub(crate) fn attach_commentary_rows(
    students: &mut [Student],
    rows: &[Vec<String>],
    headers: &HeaderIndex,
) -> Result<(), SheetsError> {
    let login_idx = headers.require("Login")?;
    let course_idx = headers.require("Course")?;
    let accepted_idx = headers.require("Accepted")?;
    let commentary_idx: HashMap<EmailType, usize> = EmailType::CONCRETE
        .iter()
        .filter_map(|&t| headers.get(t.column_header()).map(|idx| (t, idx)))
        .collect();

    let mut by_key: HashMap<(String, String), &Vec<String>> = HashMap::new();
    for row in rows {
        let login = cell_text(row, login_idx).trim();
        let course = cell_text(row, course_idx).trim();
        let accepted = cell_text(row, accepted_idx).trim();
        if login.is_empty() || course.is_empty() || accepted.is_empty() {
            continue;
        }
        by_key
            .entry((login.to_lowercase(), course.to_lowercase()))
            .or_insert(row);
    }

    for student in students {
        let login = student.login().to_lowercase();
        for course in &mut student.courses {
            let Some(status) = course.status else { continue };
            let Some(row) = by_key.get(&(login.clone(), course.name.to_lowercase())) else {
                continue;
            };
            if let Some(&idx) = commentary_idx.get(&status) {
                course.email_commentary = cell_text(row, idx).trim().to_string();
            }
        }
    }
    Ok(())
}

impl Engine {
    /// Reads the summary tab back into `Student` records, commentary
    /// included.
    pub fn extract_students(&mut self) -> Result<Vec<Student>, SheetsError> {
        let summary = self.settings.summary_tab_name.clone();
        let spreadsheet = self.event.spreadsheet_id.clone();

        let data_range = format!("{summary}!A{SUMMARY_FIRST_DATA_ROW}:BZ");
        let rows = with_rate_limit_retry("read summary", &self.cancel, || {
            self.api.read_values(&spreadsheet, &data_range)
        })?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let header_row_number = SUMMARY_FIRST_DATA_ROW - 1;
        let header_range = format!("{summary}!A{header_row_number}:BZ{header_row_number}");
        let header_row = with_rate_limit_retry("read summary headers", &self.cancel, || {
            self.api.read_values(&spreadsheet, &header_range)
        })?
        .into_iter()
        .next()
        .unwrap_or_default();
        let headers = HeaderIndex::from_row(&header_row);

        let code_row_number = SUMMARY_FIRST_DATA_ROW - 2;
        let code_range = format!("{summary}!B{code_row_number}:AZ{code_row_number}");
        let code_row = with_rate_limit_retry("read summary course codes", &self.cancel, || {
            self.api.read_values(&spreadsheet, &code_range)
        })?
        .into_iter()
        .next()
        .unwrap_or_default();
        let course_columns = course_code_columns(&code_row);

        let mut students =
            parse_students(&rows, &headers, &course_columns, &self.event.courses)?;
        self.attach_commentary(&mut students)?;
        Ok(students)
    }

    fn attach_commentary(&mut self, students: &mut [Student]) -> Result<(), SheetsError> {
        let reg = self.settings.registration_tab_name.clone();
        let spreadsheet = self.event.spreadsheet_id.clone();

        let rows = with_rate_limit_retry("read registrations", &self.cancel, || {
            self.api.read_values(&spreadsheet, &format!("{reg}!A2:BZ"))
        })?;
        let header_row = with_rate_limit_retry("read registration headers", &self.cancel, || {
            self.api.read_values(&spreadsheet, &format!("{reg}!A1:BZ1"))
        })?
        .into_iter()
        .next()
        .unwrap_or_default();
        let headers = HeaderIndex::from_row(&header_row);
        attach_commentary_rows(students, &rows, &headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn course(name: &str, code: &str) -> Course {
        Course {
            id: 0,
            name: name.into(),
            code: code.into(),
            start: NaiveDate::from_ymd_opt(2026, 9, 7).unwrap(),
            end: NaiveDate::from_ymd_opt(2026, 12, 14).unwrap(),
            day_of_week: "Monday".into(),
            time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
            location: String::new(),
            additional_comment: String::new(),
            is_solo: false,
            is_shorter: false,
            role: None,
            status: None,
            email_commentary: String::new(),
        }
    }

    /// Header row matching a two-course layout with the cheaper tier:
    /// courses at B..C, sums at D..E, student columns from F.
    fn summary_headers() -> Vec<String> {
        let mut row = vec![String::new(); 31];
        row[5] = "Email".into();
        row[6] = "First Name".into();
        row[7] = "Last Name".into();
        row[8] = "Phone Number".into();
        row[9] = "Courses".into();
        row[10] = "Partner".into();
        row[11] = "Installment".into();
        row[12] = "Discount".into();
        row[13] = "Installment\nSum".into();
        row[14] = "Need to\nbe Paid".into();
        row[25] = "Confirmation".into();
        row[26] = "Waiting List".into();
        row[27] = "Not Enough People".into();
        row[28] = "Full Class".into();
        row[29] = "Missing Partner".into();
        row
    }

    fn summary_row(
        email: &str,
        first: &str,
        last: &str,
        courses: &str,
        statuses: [&str; 2],
        owed: &str,
        installment: &str,
        sent_confirmation: &str,
    ) -> Vec<String> {
        let mut row = vec![String::new(); 31];
        row[1] = statuses[0].into();
        row[2] = statuses[1].into();
        row[5] = email.into();
        row[6] = first.into();
        row[7] = last.into();
        row[9] = courses.into();
        row[11] = installment.into();
        row[14] = owed.into();
        row[25] = sent_confirmation.into();
        row
    }

    fn code_columns() -> Vec<(String, usize)> {
        // stacked codes at B and C, followed by the numeric sum cells
        course_code_columns(&[
            "T\n1".to_string(),
            "S\n1".to_string(),
            "3".to_string(),
            "1".to_string(),
            String::new(),
        ])
    }

    #[test]
    fn code_scan_stops_at_the_gap_and_keeps_positions() {
        let columns = code_columns();
        // the numeric attendance sums slip through but match no course code
        assert_eq!(
            columns,
            vec![
                ("T1".to_string(), 1),
                ("S1".to_string(), 2),
                ("3".to_string(), 3),
                ("1".to_string(), 4),
            ]
        );
    }

    #[test]
    fn extraction_builds_typed_students() {
        let headers = HeaderIndex::from_row(&summary_headers());
        let rows = vec![summary_row(
            "a@b.com",
            "Jane",
            "Doe",
            "Tango",
            ["1", ""],
            "180 zł",
            "1",
            "",
        )];
        let configured = vec![course("Tango", "T1"), course("Salsa", "S1")];
        let students = parse_students(&rows, &headers, &code_columns(), &configured).unwrap();

        assert_eq!(students.len(), 1);
        let jane = &students[0];
        assert_eq!(jane.id, 0);
        assert_eq!(jane.first_name, "Jane");
        assert_eq!(jane.last_name, "Doe");
        assert_eq!(jane.payment_amount, 180);
        assert!(jane.installments);
        assert_eq!(jane.courses.len(), 1);
        assert_eq!(jane.courses[0].name, "Tango");
        assert_eq!(jane.courses[0].status, Some(EmailType::Confirmation));
        assert!(jane.already_sent.is_empty());
    }

    #[test]
    fn rows_without_email_or_matched_courses_are_dropped() {
        let headers = HeaderIndex::from_row(&summary_headers());
        let rows = vec![
            summary_row("", "Jane", "Doe", "Tango", ["1", ""], "0", "", ""),
            summary_row("b@c.com", "Max", "M", "Ballet", ["", ""], "0", "", ""),
            summary_row("c@d.com", "Eve", "E", "Salsa", ["", "w"], "0", "", ""),
        ];
        let configured = vec![course("Tango", "T1"), course("Salsa", "S1")];
        let students = parse_students(&rows, &headers, &code_columns(), &configured).unwrap();

        // the unknown "Ballet" name contributes nothing and does not error
        assert_eq!(students.len(), 1);
        assert_eq!(students[0].email, "c@d.com");
        // the id stays the true row ordinal, gaps included
        assert_eq!(students[0].id, 2);
        assert_eq!(students[0].courses[0].status, Some(EmailType::WaitingList));
    }

    #[test]
    fn sent_markers_become_already_sent_flags() {
        let headers = HeaderIndex::from_row(&summary_headers());
        let rows = vec![summary_row(
            "a@b.com",
            "Jane",
            "Doe",
            "Tango",
            ["1", ""],
            "180 zł",
            "",
            "2026-08-01 CONFIRMATION",
        )];
        let configured = vec![course("Tango", "T1")];
        let students = parse_students(&rows, &headers, &code_columns(), &configured).unwrap();
        assert_eq!(students[0].already_sent, vec![EmailType::Confirmation]);
        assert!(!students[0].installments);
    }

    #[test]
    fn amounts_lose_their_currency_decoration() {
        assert_eq!(parse_amount("1 200 zł"), 1200);
        assert_eq!(parse_amount("240"), 240);
        assert_eq!(parse_amount(""), 0);
        assert_eq!(parse_amount("garbage"), 0);
    }

    #[test]
    fn commentary_joins_on_login_and_course() {
        let headers = HeaderIndex::from_row(&summary_headers());
        let rows = vec![summary_row(
            "a@b.com",
            "Jane",
            "Doe",
            "Tango",
            ["1", ""],
            "180 zł",
            "",
            "",
        )];
        let configured = vec![course("Tango", "T1")];
        let mut students = parse_students(&rows, &headers, &code_columns(), &configured).unwrap();

        // registration tab: login, ..., course at F, accepted at J,
        // commentary block from P (accepted + 6)
        let mut reg_header = vec![String::new(); 20];
        reg_header[0] = "Login".into();
        reg_header[5] = "Course".into();
        reg_header[9] = "Accepted".into();
        reg_header[15] = "Confirmation".into();
        reg_header[16] = "Waiting List".into();
        let mut reg_row = vec![String::new(); 20];
        reg_row[0] = "a@b.com,jane,doe".into();
        reg_row[5] = "Tango".into();
        reg_row[9] = "1".into();
        reg_row[15] = "bring comfortable shoes".into();

        attach_commentary_rows(
            &mut students,
            &[reg_row],
            &HeaderIndex::from_row(&reg_header),
        )
        .unwrap();
        assert_eq!(
            students[0].courses[0].email_commentary,
            "bring comfortable shoes"
        );
    }

    #[test]
    fn header_index_normalizes_newlines_and_case() {
        let headers = HeaderIndex::from_row(&summary_headers());
        assert_eq!(headers.get("installment sum"), Some(13));
        assert_eq!(headers.get("Need to be Paid"), Some(14));
        assert!(headers.require("No Such Column").is_err());
    }
}
