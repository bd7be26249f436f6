//! Remote spreadsheet access.
//!
//! A thin client over the Sheets v4 REST surface: spreadsheet metadata,
//! batched cell/format updates, bounded-range value reads and single-cell
//! writes. This layer only classifies failures; retry policy lives with the
//! callers (`buffer::RequestBuffer::flush`, tab provisioning) via
//! `with_rate_limit_retry`.

use crate::job_controller::state::CancelToken;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::thread;
use std::time::Duration;

/// Fixed backoff applied when the remote API reports rate limiting.
pub const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(30);
/// Attempts before a rate-limited operation is given up on.
pub const RATE_LIMIT_MAX_RETRIES: u32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum SheetsError {
    #[error("remote API rate limit hit")]
    RateLimited,
    #[error("remote API rejected the request ({status}): {message}")]
    Permanent { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("spreadsheet id mismatch: requested {requested}, server echoed {returned}")]
    SpreadsheetIdMismatch { requested: String, returned: String },
    #[error("tab {0:?} does not exist")]
    MissingTab(String),
    #[error("no generated tabs to delete")]
    NothingToDelete,
    #[error("malformed response: {0}")]
    InvalidResponse(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("rate-limit retries exhausted after {0} attempts")]
    RetriesExhausted(u32),
}

/// Runs `operation`, sleeping out rate limits with the fixed backoff until
/// it succeeds, fails for another reason, is cancelled, or the attempt
/// budget runs out. The cancellation token is only consulted between
/// attempts; an in-flight request is never interrupted.
pub fn with_rate_limit_retry<T>(
    description: &str,
    cancel: &CancelToken,
    mut operation: impl FnMut() -> Result<T, SheetsError>,
) -> Result<T, SheetsError> {
    let mut attempts = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(SheetsError::Cancelled);
        }
        match operation() {
            Err(SheetsError::RateLimited) => {
                attempts += 1;
                if attempts >= RATE_LIMIT_MAX_RETRIES {
                    return Err(SheetsError::RetriesExhausted(attempts));
                }
                warn!(
                    "{description}: quota exceeded, retrying in {}s (attempt {attempts}/{RATE_LIMIT_MAX_RETRIES})",
                    RATE_LIMIT_BACKOFF.as_secs()
                );
                thread::sleep(RATE_LIMIT_BACKOFF);
            }
            other => return other,
        }
    }
}

// --- batchUpdate request model (the subset the engine emits) ---

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRange {
    pub sheet_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_row_index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_row_index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_column_index: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_column_index: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridCoordinate {
    pub sheet_id: i64,
    pub row_index: i64,
    pub column_index: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formula_value: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_entered_value: Option<ExtendedValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_entered_format: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RowData {
    pub values: Vec<CellData>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCellsRequest {
    pub start: GridCoordinate,
    pub rows: Vec<RowData>,
    pub fields: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatCellRequest {
    pub range: GridRange,
    pub cell: CellData,
    pub fields: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBordersRequest {
    pub range: GridRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottom: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeCellsRequest {
    pub range: GridRange,
    pub merge_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionRange {
    pub sheet_id: i64,
    pub dimension: String,
    pub start_index: i64,
    pub end_index: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDimensionPropertiesRequest {
    pub range: DimensionRange,
    pub properties: Value,
    pub fields: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridProperties {
    pub column_count: u32,
    pub row_count: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSheetProperties {
    pub title: String,
    pub grid_properties: GridProperties,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSheetRequest {
    pub properties: NewSheetProperties,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSheetRequest {
    pub sheet_id: i64,
}

/// One batch-update entry; exactly one field is set.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_sheet: Option<AddSheetRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_sheet: Option<DeleteSheetRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_cells: Option<UpdateCellsRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_cell: Option<RepeatCellRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_borders: Option<UpdateBordersRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge_cells: Option<MergeCellsRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_dimension_properties: Option<UpdateDimensionPropertiesRequest>,
}

// --- response model ---

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabProperties {
    pub sheet_id: i64,
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tab {
    pub properties: TabProperties,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadsheetMeta {
    pub spreadsheet_id: String,
    #[serde(default)]
    pub sheets: Vec<Tab>,
}

impl SpreadsheetMeta {
    pub fn tab_id(&self, title: &str) -> Option<i64> {
        self.sheets
            .iter()
            .find(|tab| tab.properties.title == title)
            .map(|tab| tab.properties.sheet_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddSheetReply {
    pub properties: TabProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    #[serde(default)]
    pub add_sheet: Option<AddSheetReply>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateResponse {
    pub spreadsheet_id: String,
    #[serde(default)]
    pub replies: Vec<Reply>,
}

#[derive(Debug, Clone, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Option<Vec<Vec<Value>>>,
}

/// The seam every engine operation goes through; the HTTP client below is
/// the production implementation, tests substitute an in-memory one.
pub trait SheetsApi: Send + Sync {
    fn metadata(&self, spreadsheet_id: &str) -> Result<SpreadsheetMeta, SheetsError>;

    fn batch_update(
        &self,
        spreadsheet_id: &str,
        requests: &[Request],
    ) -> Result<BatchUpdateResponse, SheetsError>;

    /// Reads a bounded range as plain display values, row-major.
    fn read_values(&self, spreadsheet_id: &str, range: &str)
        -> Result<Vec<Vec<String>>, SheetsError>;

    /// Writes one user-entered value into a single cell.
    fn write_value(
        &self,
        spreadsheet_id: &str,
        range: &str,
        value: &str,
    ) -> Result<(), SheetsError>;
}

pub struct HttpSheetsClient {
    http: reqwest::blocking::Client,
    base_url: String,
    token: String,
}

const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com/v4";

impl HttpSheetsClient {
    pub fn new(token: String) -> Self {
        Self::with_base_url(token, DEFAULT_BASE_URL.to_string())
    }

    /// Tests and self-hosted proxies point this at another endpoint.
    pub fn with_base_url(token: String, base_url: String) -> Self {
        HttpSheetsClient {
            http: reqwest::blocking::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn check(response: reqwest::blocking::Response) -> Result<reqwest::blocking::Response, SheetsError> {
        let status = response.status();
        if status.as_u16() == 429 {
            return Err(SheetsError::RateLimited);
        }
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(SheetsError::Permanent {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    fn encode_range(range: &str) -> String {
        range.replace(' ', "%20").replace('\'', "%27")
    }
}

impl SheetsApi for HttpSheetsClient {
    fn metadata(&self, spreadsheet_id: &str) -> Result<SpreadsheetMeta, SheetsError> {
        let url = format!(
            "{}/spreadsheets/{spreadsheet_id}?fields=spreadsheetId,sheets.properties(sheetId,title)",
            self.base_url
        );
        let response = self.http.get(url).bearer_auth(&self.token).send()?;
        Ok(Self::check(response)?.json()?)
    }

    fn batch_update(
        &self,
        spreadsheet_id: &str,
        requests: &[Request],
    ) -> Result<BatchUpdateResponse, SheetsError> {
        let url = format!("{}/spreadsheets/{spreadsheet_id}:batchUpdate", self.base_url);
        let body = serde_json::json!({ "requests": requests });
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()?;
        let parsed: BatchUpdateResponse = Self::check(response)?.json()?;
        if parsed.spreadsheet_id != spreadsheet_id {
            return Err(SheetsError::SpreadsheetIdMismatch {
                requested: spreadsheet_id.to_string(),
                returned: parsed.spreadsheet_id,
            });
        }
        Ok(parsed)
    }

    fn read_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, SheetsError> {
        let url = format!(
            "{}/spreadsheets/{spreadsheet_id}/values/{}",
            self.base_url,
            Self::encode_range(range)
        );
        let response = self.http.get(url).bearer_auth(&self.token).send()?;
        let parsed: ValueRange = Self::check(response)?.json()?;
        let rows = parsed.values.unwrap_or_default();
        Ok(rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| match cell {
                        Value::String(s) => s,
                        Value::Null => String::new(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .collect())
    }

    fn write_value(
        &self,
        spreadsheet_id: &str,
        range: &str,
        value: &str,
    ) -> Result<(), SheetsError> {
        let url = format!(
            "{}/spreadsheets/{spreadsheet_id}/values/{}?valueInputOption=USER_ENTERED",
            self.base_url,
            Self::encode_range(range)
        );
        let body = serde_json::json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": [[value]],
        });
        let response = self
            .http
            .put(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()?;
        Self::check(response)?;
        Ok(())
    }
}
