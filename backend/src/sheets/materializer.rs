//! Registration materialization.
//!
//! Fills the normalized registration tab from the raw intake tab. Events
//! whose intake rows carry a single course go through spreadsheet-native
//! projection formulas and leave the join work to the remote engine; merged
//! events (comma-separated course lists in one cell) are synced by reading
//! both tabs as plain values and appending only the `(login, course)` pairs
//! that are not present yet, so the sync can run incrementally as new
//! registrations arrive.

use super::client::{with_rate_limit_retry, SheetsError};
use super::column::column_index;
use super::formula::{array, call, cell, text, Expr};
use super::{Engine, MAX_ROWS};
use common::model::columns::ColumnLayout;
use common::model::email::EmailType;
use log::{info, warn};
use std::collections::HashSet;

impl Engine {
    /// Creates and populates the registration tab. Does nothing when the
    /// tab already exists.
    pub(crate) fn set_up_registration_tab(&mut self) -> Result<(), SheetsError> {
        let title = self.settings.registration_tab_name.clone();
        let tab = self.ensure_tab(&title, 26, MAX_ROWS)?;
        if !tab.created {
            return Ok(());
        }

        if self.event.courses_are_merged {
            // The aggregated path owns the header row: it re-checks
            // emptiness on every sync, not only at creation.
            self.populate_aggregated()?;
            return Ok(());
        }

        self.queue_registration_headers(tab.id);
        self.queue_projection_formulas(tab.id);
        self.flush()?;

        // One Login formula per row, deliberately not a single array
        // formula, to bound per-cell complexity.
        let reg = self.reg_cols().clone();
        for row in 2..MAX_ROWS + 2 {
            let expr = login_formula(&reg, row);
            self.queue_formula(tab.id, column_index(&reg.login), row, &expr);
            if row % 100 == 0 {
                self.flush()?;
            }
        }
        self.flush()
    }

    /// Appends registrations that arrived since the last sync. Returns the
    /// number of appended rows; zero for non-merged events, whose
    /// projection formulas pick new rows up by themselves.
    pub fn sync_new_registrations(&mut self) -> Result<u32, SheetsError> {
        if !self.event.courses_are_merged {
            info!(
                "event {:?} does not aggregate courses, registration formulas keep themselves current",
                self.event.name
            );
            return Ok(0);
        }
        self.populate_aggregated()
    }

    fn populate_aggregated(&mut self) -> Result<u32, SheetsError> {
        let raw_range = format!("{}!A2:O", self.settings.raw_data_tab_name);
        let reg_title = self.settings.registration_tab_name.clone();
        let reg_range = format!("{reg_title}!A2:O");

        let raw = with_rate_limit_retry("read raw intake", &self.cancel, || {
            self.api.read_values(&self.event.spreadsheet_id, &raw_range)
        })?;
        let existing = with_rate_limit_retry("read registrations", &self.cancel, || {
            self.api.read_values(&self.event.spreadsheet_id, &reg_range)
        })?;
        let tab_id = self
            .tab_id(&reg_title)?
            .ok_or(SheetsError::MissingTab(reg_title))?;

        if existing.is_empty() {
            self.queue_registration_headers(tab_id);
        }

        let plan = plan_aggregated_rows(
            &raw,
            &existing,
            &self.event.raw_columns,
            &self.event.registration_columns,
        );
        for write in &plan.writes {
            self.buffer
                .add_formula(tab_id, write.col, write.row, text(&write.value).formula());
        }
        self.flush()?;

        if plan.appended > 0 {
            warn!(
                "appended {} registration row(s); remote formula recalculation may lag behind the append",
                plan.appended
            );
        }
        Ok(plan.appended)
    }

    /// Header row of the registration tab: the mapped columns plus the five
    /// commentary columns organizers fill per email type.
    pub(crate) fn queue_registration_headers(&mut self, sheet_id: i64) {
        let reg = self.reg_cols().clone();
        for (letters, label) in [
            (reg.login.clone(), "Login"),
            (reg.email.clone(), "Email"),
            (reg.first_name.clone(), "First name"),
            (reg.last_name.clone(), "Last name"),
            (reg.phone_number.clone(), "Phone number"),
            (reg.course.clone(), "Course"),
            (reg.role.clone(), "Role"),
            (reg.partner.clone(), "Partner"),
            (reg.installment.clone(), "Installment"),
            (reg.accepted.clone(), "Accepted"),
        ] {
            self.queue_text(sheet_id, column_index(&letters), 1, label);
        }

        // Commentary columns sit past the installment block the summary
        // synthesis adds after the accepted column.
        let mut col = column_index(&reg.accepted) + 6;
        for email_type in EmailType::CONCRETE {
            self.queue_text(sheet_id, col, 1, email_type.column_header());
            col += 1;
        }
    }

    fn queue_projection_formulas(&mut self, sheet_id: i64) {
        let raw_tab = self.settings.raw_data_tab_name.clone();
        let raw = self.raw_cols().clone();
        let reg = self.reg_cols().clone();

        let project = |letters: &str| -> Expr {
            let col = column_index(letters);
            call(
                "QUERY",
                vec![array(vec![cell(col, 2).in_tab(&raw_tab).to(col, None).into()])],
            )
        };

        for (target, source) in [
            (&reg.email, &raw.email),
            (&reg.first_name, &raw.first_name),
            (&reg.last_name, &raw.last_name),
            (&reg.phone_number, &raw.phone_number),
        ] {
            let expr = project(source);
            self.queue_formula(sheet_id, column_index(target), 2, &expr);
        }

        // Intake forms suffix the course answer with a description after a
        // dash; only the part before it is the course name.
        let course_col = column_index(&raw.course);
        let course_expr = call(
            "ARRAYFORMULA",
            vec![call(
                "QUERY",
                vec![call(
                    "IFERROR",
                    vec![
                        call(
                            "TRIM",
                            vec![call(
                                "REGEXEXTRACT",
                                vec![
                                    cell(course_col, 2).in_tab(&raw_tab).to(course_col, None).into(),
                                    text("^[^-]+"),
                                ],
                            )],
                        ),
                        text(""),
                    ],
                )],
            )],
        );
        self.queue_formula(sheet_id, column_index(&reg.course), 2, &course_expr);

        for (target, source) in [(&reg.role, &raw.role), (&reg.partner, &raw.partner)] {
            let expr = project(source);
            self.queue_formula(sheet_id, column_index(target), 2, &expr);
        }

        let installment_col = column_index(&raw.installment);
        let installment_expr = call(
            "ARRAYFORMULA",
            vec![call(
                "IF",
                vec![
                    call(
                        "ISBLANK",
                        vec![cell(installment_col, 2)
                            .in_tab(&raw_tab)
                            .to(installment_col, None)
                            .into()],
                    ),
                    text(""),
                    Expr::Int(1),
                ],
            )],
        );
        self.queue_formula(sheet_id, column_index(&reg.installment), 2, &installment_expr);
    }
}

/// The derived Login key: `lowercase(email),lowercase(first),lowercase(last)`,
/// trimmed, assembled with nested CONCAT the way the sheet evaluates it.
fn login_formula(reg: &ColumnLayout, row: u32) -> Expr {
    let part = |letters: &str| -> Expr {
        call(
            "TRIM",
            vec![call("LOWER", vec![cell(column_index(letters), row).into()])],
        )
    };
    let concat = |left: Expr, right: Expr| call("CONCAT", vec![left, right]);
    concat(
        concat(
            concat(concat(part(&reg.email), text(",")), part(&reg.first_name)),
            text(","),
        ),
        part(&reg.last_name),
    )
}

pub(crate) struct CellWrite {
    pub col: u32,
    pub row: u32,
    pub value: String,
}

pub(crate) struct AppendPlan {
    pub writes: Vec<CellWrite>,
    pub appended: u32,
}

fn cell_at<'a>(row: &'a [String], letters: &str) -> &'a str {
    row.get(column_index(letters) as usize - 1)
        .map(String::as_str)
        .unwrap_or("")
}

fn title_case(value: &str) -> String {
    value
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Plans the merged-path append. Pure over the two value snapshots: rows
/// already present (matched case-sensitively on the Login key and course
/// name) are skipped, new pairs get literal-value writes continuing right
/// after the last populated row. Role and partner are not part of the
/// membership test; a re-registration under a different role keeps the
/// first row's values.
pub(crate) fn plan_aggregated_rows(
    raw: &[Vec<String>],
    existing: &[Vec<String>],
    raw_cols: &ColumnLayout,
    reg_cols: &ColumnLayout,
) -> AppendPlan {
    let mut seen: HashSet<(String, String)> = existing
        .iter()
        .map(|row| {
            (
                cell_at(row, &reg_cols.login).to_string(),
                cell_at(row, &reg_cols.course).to_string(),
            )
        })
        .collect();

    let mut writes = Vec::new();
    let mut appended = 0;
    let mut next_row = existing.len() as u32 + 2;

    for row in raw {
        let email = cell_at(row, &raw_cols.email).trim().to_lowercase();
        if email.is_empty() {
            continue;
        }
        let first_name = title_case(cell_at(row, &raw_cols.first_name).trim());
        let last_name = title_case(&cell_at(row, &raw_cols.last_name).trim().to_lowercase());
        let phone = cell_at(row, &raw_cols.phone_number).trim().to_string();
        let role = cell_at(row, &raw_cols.role).trim().to_string();
        let partner = cell_at(row, &raw_cols.partner).trim().to_string();
        let login = format!("{email},{first_name},{last_name}");

        for course in cell_at(row, &raw_cols.course)
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
        {
            if !seen.insert((login.clone(), course.to_string())) {
                continue;
            }
            for (letters, value) in [
                (&reg_cols.login, login.clone()),
                (&reg_cols.email, email.clone()),
                (&reg_cols.first_name, first_name.clone()),
                (&reg_cols.last_name, last_name.clone()),
                (&reg_cols.phone_number, phone.clone()),
                (&reg_cols.course, course.to_string()),
                (&reg_cols.role, role.clone()),
                (&reg_cols.partner, partner.clone()),
            ] {
                writes.push(CellWrite {
                    col: column_index(letters),
                    row: next_row,
                    value,
                });
            }
            appended += 1;
            next_row += 1;
        }
    }

    AppendPlan { writes, appended }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::testing::{engine_with, test_layout, FakeApi};
    use std::sync::Arc;

    fn raw_row(email: &str, first: &str, last: &str, courses: &str) -> Vec<String> {
        // layout columns B..I: email, first, last, phone, course, role, partner, installment
        vec![
            String::new(),
            email.to_string(),
            first.to_string(),
            last.to_string(),
            "123".to_string(),
            courses.to_string(),
            "Leader".to_string(),
            "".to_string(),
        ]
    }

    fn existing_row(login: &str, course: &str) -> Vec<String> {
        let mut row = vec![String::new(); 10];
        row[0] = login.to_string();
        row[5] = course.to_string();
        row
    }

    #[test]
    fn only_unseen_pairs_are_appended() {
        let raw = vec![raw_row("A@b.com", "jane", "DOE", "Tango, Salsa")];
        let existing = vec![existing_row("a@b.com,Jane,Doe", "Tango")];
        let plan = plan_aggregated_rows(&raw, &existing, &test_layout(), &test_layout());

        assert_eq!(plan.appended, 1);
        // eight literal cells for the one Salsa row, right after the
        // existing data
        assert_eq!(plan.writes.len(), 8);
        assert!(plan.writes.iter().all(|w| w.row == 3));
        let course_write = plan
            .writes
            .iter()
            .find(|w| w.col == column_index("F"))
            .unwrap();
        assert_eq!(course_write.value, "Salsa");
        let login_write = plan.writes.iter().find(|w| w.col == 1).unwrap();
        assert_eq!(login_write.value, "a@b.com,Jane,Doe");
    }

    #[test]
    fn second_run_with_unchanged_intake_appends_nothing() {
        let raw = vec![raw_row("a@b.com", "Jane", "Doe", "Tango, Salsa")];
        let first = plan_aggregated_rows(&raw, &[], &test_layout(), &test_layout());
        assert_eq!(first.appended, 2);

        let materialized: Vec<Vec<String>> = vec![
            existing_row("a@b.com,Jane,Doe", "Tango"),
            existing_row("a@b.com,Jane,Doe", "Salsa"),
        ];
        let second = plan_aggregated_rows(&raw, &materialized, &test_layout(), &test_layout());
        assert_eq!(second.appended, 0);
        assert!(second.writes.is_empty());
    }

    #[test]
    fn duplicate_pairs_within_one_intake_run_collapse() {
        let raw = vec![
            raw_row("a@b.com", "Jane", "Doe", "Tango"),
            raw_row("a@b.com", "Jane", "Doe", "Tango"),
        ];
        let plan = plan_aggregated_rows(&raw, &[], &test_layout(), &test_layout());
        assert_eq!(plan.appended, 1);
    }

    #[test]
    fn rows_without_email_are_skipped() {
        let raw = vec![raw_row("", "Jane", "Doe", "Tango")];
        let plan = plan_aggregated_rows(&raw, &[], &test_layout(), &test_layout());
        assert_eq!(plan.appended, 0);
    }

    #[test]
    fn merged_sync_writes_headers_only_while_tab_is_empty() {
        let api = Arc::new(FakeApi::new("sheet").with_tab("Raw").with_tab("Registrations"));
        api.set_values("Raw!A2:O", vec![vec!["", "a@b.com", "Jane", "Doe", "1", "Tango", "", ""]]);
        let mut engine = engine_with(api.clone(), true);
        let appended = engine.sync_new_registrations().unwrap();
        assert_eq!(appended, 1);
        let formulas = api.formulas();
        assert!(formulas
            .iter()
            .any(|(_, col, row, f)| *col == 1 && *row == 1 && f == "=\"Login\""));
        assert!(formulas
            .iter()
            .any(|(_, col, row, f)| *col == column_index("F") && *row == 2 && f == "=\"Tango\""));
    }

    #[test]
    fn merged_sync_skips_headers_once_rows_exist() {
        let api = Arc::new(FakeApi::new("sheet").with_tab("Raw").with_tab("Registrations"));
        api.set_values("Raw!A2:O", vec![vec!["", "a@b.com", "Jane", "Doe", "1", "Tango", "", ""]]);
        api.set_values(
            "Registrations!A2:O",
            vec![vec![
                "b@c.com,Max,Mustermann",
                "b@c.com",
                "Max",
                "Mustermann",
                "456",
                "Salsa",
                "",
                "",
            ]],
        );
        let mut engine = engine_with(api.clone(), true);
        let appended = engine.sync_new_registrations().unwrap();
        assert_eq!(appended, 1);
        assert!(!api
            .formulas()
            .iter()
            .any(|(_, _, row, f)| *row == 1 && f == "=\"Login\""));
        // new row continues after the existing one
        assert!(api.formulas().iter().all(|(_, _, row, _)| *row == 3));
    }

    #[test]
    fn non_merged_setup_emits_projections_and_login_rows() {
        let api = Arc::new(FakeApi::new("sheet").with_tab("Raw"));
        let mut engine = engine_with(api.clone(), false);
        engine.set_up_registration_tab().unwrap();

        let formulas = api.formulas();
        let email_col = column_index("B");
        assert!(formulas
            .iter()
            .any(|(_, col, row, f)| *col == email_col && *row == 2 && f == "=QUERY({Raw!B2:B})"));
        let login = formulas
            .iter()
            .find(|(_, col, row, _)| *col == 1 && *row == 2)
            .unwrap();
        assert_eq!(
            login.3,
            "=CONCAT(CONCAT(CONCAT(CONCAT(TRIM(LOWER(B2));\",\");TRIM(LOWER(C2)));\",\");TRIM(LOWER(D2)))"
        );
        // one login formula per data row
        let login_rows = formulas.iter().filter(|(_, col, _, _)| *col == 1).count();
        assert_eq!(login_rows, (MAX_ROWS + 1) as usize); // header + 200 rows
    }

    #[test]
    fn existing_registration_tab_is_left_untouched() {
        let api = Arc::new(
            FakeApi::new("sheet").with_tab("Raw").with_tab("Registrations"),
        );
        let mut engine = engine_with(api.clone(), false);
        engine.set_up_registration_tab().unwrap();
        assert!(api.batches().is_empty());
    }
}
