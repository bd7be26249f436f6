//! The spreadsheet-as-database synthesis engine.
//!
//! The remote spreadsheet is the system of record: the engine provisions
//! the derived tabs, fills them with interdependent formulas that join the
//! raw intake data into per-student aggregates, keeps the normalized
//! registration tab in sync, and reads the computed summary back into
//! typed records for email dispatch.
//!
//! One `Engine` is built per operation, bound to a single event and its
//! spreadsheet. All remote writes go through the `RequestBuffer` so they
//! leave as ordered batches with a shared retry policy.

pub mod buffer;
pub mod client;
pub mod column;
pub mod extract;
pub mod formats;
pub mod formula;
pub mod materializer;
pub mod provision;
pub mod summary;

use crate::job_controller::state::CancelToken;
use buffer::RequestBuffer;
use client::{with_rate_limit_retry, DeleteSheetRequest, Request, SheetsApi, SheetsError};
use common::model::columns::ColumnLayout;
use common::model::email::EmailType;
use common::model::event::Event;
use common::model::settings::Settings;
use common::model::student::Student;
use formula::Expr;
use std::sync::Arc;
use summary::SummaryLayout;

/// Upper bound of data rows the generated formulas cover.
pub const MAX_ROWS: u32 = 200;
/// First data row of the summary tab; rows 1..=5 hold prices, course
/// metadata and headers.
pub const SUMMARY_FIRST_DATA_ROW: u32 = 6;

pub struct Engine {
    api: Arc<dyn SheetsApi>,
    buffer: RequestBuffer,
    event: Event,
    settings: Settings,
    cancel: CancelToken,
    summary_tab_id: Option<i64>,
}

impl Engine {
    pub fn new(
        api: Arc<dyn SheetsApi>,
        event: Event,
        settings: Settings,
        cancel: CancelToken,
    ) -> Self {
        Engine {
            api,
            buffer: RequestBuffer::new(),
            event,
            settings,
            cancel,
            summary_tab_id: None,
        }
    }

    fn spreadsheet_id(&self) -> &str {
        &self.event.spreadsheet_id
    }

    fn raw_cols(&self) -> &ColumnLayout {
        &self.event.raw_columns
    }

    fn reg_cols(&self) -> &ColumnLayout {
        &self.event.registration_columns
    }

    fn summary_layout(&self) -> SummaryLayout {
        SummaryLayout::for_event(
            self.event.courses.len() as u32,
            self.settings.has_cheaper_tier(),
        )
    }

    pub(crate) fn flush(&mut self) -> Result<(), SheetsError> {
        self.buffer
            .flush(self.api.as_ref(), &self.event.spreadsheet_id, &self.cancel)
    }

    fn queue_text(&mut self, sheet_id: i64, col: u32, row: u32, label: &str) {
        self.buffer
            .add_formula(sheet_id, col, row, formula::text(label).formula());
    }

    fn queue_formula(&mut self, sheet_id: i64, col: u32, row: u32, expr: &Expr) {
        self.buffer.add_formula(sheet_id, col, row, expr.formula());
    }

    fn tab_id(&self, title: &str) -> Result<Option<i64>, SheetsError> {
        let meta = with_rate_limit_retry("spreadsheet metadata", &self.cancel, || {
            self.api.metadata(self.spreadsheet_id())
        })?;
        Ok(meta.tab_id(title))
    }

    fn summary_tab_id(&mut self) -> Result<i64, SheetsError> {
        if let Some(id) = self.summary_tab_id {
            return Ok(id);
        }
        let title = self.settings.summary_tab_name.clone();
        let id = self
            .tab_id(&title)?
            .ok_or(SheetsError::MissingTab(title))?;
        self.summary_tab_id = Some(id);
        Ok(id)
    }

    /// Generates every derived tab for the event. Each step is idempotent,
    /// so a rerun after a partial failure picks up where it stopped.
    pub fn generate_tabs(&mut self) -> Result<(), SheetsError> {
        self.set_up_registration_tab()?;
        self.set_up_summary_tab()?;
        self.set_up_accounting_tab()?;
        self.set_up_overdue_tab()?;
        self.set_up_group_balance_tab()?;
        for course in self.event.courses.clone() {
            self.set_up_course_tab(&course)?;
        }
        Ok(())
    }

    /// Deletes every tab except the raw intake one; the raw data always
    /// survives a clear.
    pub fn clear_generated_tabs(&mut self) -> Result<usize, SheetsError> {
        let meta = with_rate_limit_retry("spreadsheet metadata", &self.cancel, || {
            self.api.metadata(self.spreadsheet_id())
        })?;
        let doomed: Vec<i64> = meta
            .sheets
            .iter()
            .filter(|tab| tab.properties.title != self.settings.raw_data_tab_name)
            .map(|tab| tab.properties.sheet_id)
            .collect();
        if doomed.is_empty() {
            return Err(SheetsError::NothingToDelete);
        }
        let requests: Vec<Request> = doomed
            .iter()
            .map(|&sheet_id| Request {
                delete_sheet: Some(DeleteSheetRequest { sheet_id }),
                ..Default::default()
            })
            .collect();
        with_rate_limit_retry("delete generated tabs", &self.cancel, || {
            self.api
                .batch_update(self.spreadsheet_id(), &requests)
                .map(|_| ())
        })?;
        self.summary_tab_id = None;
        Ok(doomed.len())
    }

    /// Writes the dated sent marker for one student and email type into the
    /// summary tab and flushes immediately, so the bookkeeping survives a
    /// later failure in the same batch.
    pub fn mark_email_sent(
        &mut self,
        student: &Student,
        email_type: EmailType,
        today: chrono::NaiveDate,
    ) -> Result<(), SheetsError> {
        let layout = self.summary_layout();
        let sheet_id = self.summary_tab_id()?;
        let marker = format!(
            "{} {}",
            today.format("%Y-%m-%d"),
            email_type.sent_marker_text()
        );
        let row = SUMMARY_FIRST_DATA_ROW + student.id as u32;
        self.queue_text(sheet_id, layout.marker_col(email_type), row, &marker);
        self.flush()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::client::{
        AddSheetReply, BatchUpdateResponse, Reply, Request, SheetsApi, SheetsError,
        SpreadsheetMeta, Tab, TabProperties,
    };
    use super::Engine;
    use crate::job_controller::state::CancelToken;
    use common::model::columns::ColumnLayout;
    use common::model::event::Event;
    use common::model::settings::{MailerSettings, Settings};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    pub(crate) fn test_layout() -> ColumnLayout {
        ColumnLayout {
            date_time: String::new(),
            email: "B".into(),
            first_name: "C".into(),
            last_name: "D".into(),
            phone_number: "E".into(),
            course: "F".into(),
            role: "G".into(),
            partner: "H".into(),
            installment: "I".into(),
            login: "A".into(),
            accepted: "J".into(),
        }
    }

    pub(crate) fn test_settings() -> Settings {
        Settings {
            mailer: MailerSettings::default(),
            raw_data_tab_name: "Raw".into(),
            registration_tab_name: "Registrations".into(),
            summary_tab_name: "Summary".into(),
            group_balance_tab_name: "GroupBalance".into(),
            leader_text: "Leader".into(),
            follower_text: "Follower".into(),
            solo_text: "Solo".into(),
            prices: vec![180, 160, 140, 120],
            installment_surcharge: 20,
            test_mail_recipient: "test@example.com".into(),
        }
    }

    pub(crate) fn test_event(merged: bool) -> Event {
        Event {
            id: 1,
            name: "Autumn".into(),
            start_date: chrono::NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            courses_are_merged: merged,
            spreadsheet_id: "sheet".into(),
            raw_columns: test_layout(),
            registration_columns: test_layout(),
            courses: Vec::new(),
        }
    }

    pub(crate) fn engine_with(api: Arc<FakeApi>, merged: bool) -> Engine {
        Engine::new(
            api,
            test_event(merged),
            test_settings(),
            CancelToken::default(),
        )
    }

    /// In-memory stand-in for the remote API. Values are served per exact
    /// range string; batches are recorded verbatim for assertions.
    pub struct FakeApi {
        spreadsheet_id: String,
        tabs: Mutex<Vec<(i64, String)>>,
        next_tab_id: Mutex<i64>,
        values: Mutex<HashMap<String, Vec<Vec<String>>>>,
        batches: Mutex<Vec<Vec<Request>>>,
        written: Mutex<Vec<(String, String)>>,
        fail_next: Mutex<Option<SheetsError>>,
    }

    impl FakeApi {
        pub fn new(spreadsheet_id: &str) -> Self {
            FakeApi {
                spreadsheet_id: spreadsheet_id.to_string(),
                tabs: Mutex::new(Vec::new()),
                next_tab_id: Mutex::new(100),
                values: Mutex::new(HashMap::new()),
                batches: Mutex::new(Vec::new()),
                written: Mutex::new(Vec::new()),
                fail_next: Mutex::new(None),
            }
        }

        pub fn with_tab(self, title: &str) -> Self {
            self.add_tab(title);
            self
        }

        pub fn add_tab(&self, title: &str) -> i64 {
            let mut next = self.next_tab_id.lock().unwrap();
            let id = *next;
            *next += 1;
            self.tabs.lock().unwrap().push((id, title.to_string()));
            id
        }

        pub fn set_values(&self, range: &str, rows: Vec<Vec<&str>>) {
            let rows = rows
                .into_iter()
                .map(|row| row.into_iter().map(str::to_string).collect())
                .collect();
            self.values.lock().unwrap().insert(range.to_string(), rows);
        }

        pub fn batches(&self) -> Vec<Vec<Request>> {
            self.batches.lock().unwrap().clone()
        }

        /// Every queued formula across all recorded batches, as
        /// (sheet_id, col, row, formula) with 1-based coordinates.
        pub fn formulas(&self) -> Vec<(i64, u32, u32, String)> {
            self.batches()
                .iter()
                .flatten()
                .filter_map(|request| request.update_cells.as_ref())
                .filter_map(|update| {
                    let formula = update.rows.first()?.values.first()?
                        .user_entered_value
                        .as_ref()?
                        .formula_value
                        .clone()?;
                    Some((
                        update.start.sheet_id,
                        update.start.column_index as u32 + 1,
                        update.start.row_index as u32 + 1,
                        formula,
                    ))
                })
                .collect()
        }

        pub fn written(&self) -> Vec<(String, String)> {
            self.written.lock().unwrap().clone()
        }

        pub fn fail_next_batch(&self, error: SheetsError) {
            *self.fail_next.lock().unwrap() = Some(error);
        }
    }

    impl SheetsApi for FakeApi {
        fn metadata(&self, _spreadsheet_id: &str) -> Result<SpreadsheetMeta, SheetsError> {
            Ok(SpreadsheetMeta {
                spreadsheet_id: self.spreadsheet_id.clone(),
                sheets: self
                    .tabs
                    .lock()
                    .unwrap()
                    .iter()
                    .map(|(sheet_id, title)| Tab {
                        properties: TabProperties {
                            sheet_id: *sheet_id,
                            title: title.clone(),
                        },
                    })
                    .collect(),
            })
        }

        fn batch_update(
            &self,
            _spreadsheet_id: &str,
            requests: &[Request],
        ) -> Result<BatchUpdateResponse, SheetsError> {
            if let Some(error) = self.fail_next.lock().unwrap().take() {
                return Err(error);
            }
            self.batches.lock().unwrap().push(requests.to_vec());
            let replies = requests
                .iter()
                .map(|request| Reply {
                    add_sheet: request.add_sheet.as_ref().map(|add| {
                        let id = self.add_tab(&add.properties.title);
                        AddSheetReply {
                            properties: TabProperties {
                                sheet_id: id,
                                title: add.properties.title.clone(),
                            },
                        }
                    }),
                })
                .collect();
            Ok(BatchUpdateResponse {
                spreadsheet_id: self.spreadsheet_id.clone(),
                replies,
            })
        }

        fn read_values(
            &self,
            _spreadsheet_id: &str,
            range: &str,
        ) -> Result<Vec<Vec<String>>, SheetsError> {
            Ok(self
                .values
                .lock()
                .unwrap()
                .get(range)
                .cloned()
                .unwrap_or_default())
        }

        fn write_value(
            &self,
            _spreadsheet_id: &str,
            range: &str,
            value: &str,
        ) -> Result<(), SheetsError> {
            self.written
                .lock()
                .unwrap()
                .push((range.to_string(), value.to_string()));
            Ok(())
        }
    }
}
