//! Pending-write accumulation and batched flushing.
//!
//! Formula writes and formatting operations queue up in order and go out as
//! one `batchUpdate` on `flush`. Order matters: the backing API applies
//! requests sequentially, so a later write to the same cell wins. A flush
//! that fails for anything but rate limiting drops the buffered writes and
//! surfaces the error; the caller decides whether to rebuild and retry.

use super::client::{
    with_rate_limit_retry, CellData, DimensionRange, ExtendedValue, GridCoordinate, GridRange,
    MergeCellsRequest, RepeatCellRequest, Request, RowData, SheetsApi, SheetsError,
    UpdateBordersRequest, UpdateCellsRequest, UpdateDimensionPropertiesRequest,
};
use super::formats::{solid_black_border, CellFormat};
use crate::job_controller::state::CancelToken;

#[derive(Default)]
pub struct RequestBuffer {
    queued: Vec<Request>,
}

impl RequestBuffer {
    pub fn new() -> Self {
        RequestBuffer::default()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    pub fn push(&mut self, request: Request) {
        self.queued.push(request);
    }

    /// Queues a formula write into a single cell; `col` and `row` are
    /// 1-based.
    pub fn add_formula(&mut self, sheet_id: i64, col: u32, row: u32, formula: String) {
        self.push(Request {
            update_cells: Some(UpdateCellsRequest {
                start: GridCoordinate {
                    sheet_id,
                    row_index: i64::from(row) - 1,
                    column_index: i64::from(col) - 1,
                },
                rows: vec![RowData {
                    values: vec![CellData {
                        user_entered_value: Some(ExtendedValue {
                            formula_value: Some(formula),
                        }),
                        user_entered_format: None,
                    }],
                }],
                fields: "userEnteredValue.formulaValue".to_string(),
            }),
            ..Default::default()
        });
    }

    /// Queues a format for a single cell; `col` and `row` are 1-based.
    pub fn add_cell_format(&mut self, sheet_id: i64, col: u32, row: u32, format: &CellFormat) {
        self.add_range_format(
            sheet_id,
            GridRange {
                sheet_id,
                start_row_index: Some(i64::from(row) - 1),
                end_row_index: Some(i64::from(row)),
                start_column_index: Some(i64::from(col) - 1),
                end_column_index: Some(i64::from(col)),
            },
            format,
        );
    }

    pub fn add_range_format(&mut self, sheet_id: i64, range: GridRange, format: &CellFormat) {
        let range = GridRange { sheet_id, ..range };
        self.push(Request {
            repeat_cell: Some(RepeatCellRequest {
                range,
                cell: CellData {
                    user_entered_value: None,
                    user_entered_format: Some(format.format.clone()),
                },
                fields: format.fields.to_string(),
            }),
            ..Default::default()
        });
    }

    pub fn hide_row(&mut self, sheet_id: i64, row: u32) {
        self.set_dimension(
            sheet_id,
            "ROWS",
            i64::from(row) - 1,
            i64::from(row),
            serde_json::json!({ "hiddenByUser": true }),
            "hiddenByUser",
        );
    }

    pub fn hide_column(&mut self, sheet_id: i64, col: u32) {
        self.set_dimension(
            sheet_id,
            "COLUMNS",
            i64::from(col) - 1,
            i64::from(col),
            serde_json::json!({ "hiddenByUser": true }),
            "hiddenByUser",
        );
    }

    pub fn set_column_width(&mut self, sheet_id: i64, col: u32, pixels: i64) {
        self.set_column_span_width(sheet_id, col, col, pixels);
    }

    pub fn set_column_span_width(&mut self, sheet_id: i64, from_col: u32, to_col: u32, pixels: i64) {
        self.set_dimension(
            sheet_id,
            "COLUMNS",
            i64::from(from_col) - 1,
            i64::from(to_col),
            serde_json::json!({ "pixelSize": pixels }),
            "pixelSize",
        );
    }

    fn set_dimension(
        &mut self,
        sheet_id: i64,
        dimension: &str,
        start_index: i64,
        end_index: i64,
        properties: serde_json::Value,
        fields: &str,
    ) {
        self.push(Request {
            update_dimension_properties: Some(UpdateDimensionPropertiesRequest {
                range: DimensionRange {
                    sheet_id,
                    dimension: dimension.to_string(),
                    start_index,
                    end_index,
                },
                properties,
                fields: fields.to_string(),
            }),
            ..Default::default()
        });
    }

    /// Solid border under one row, across `cols` columns; `row` is 1-based.
    pub fn border_under_row(&mut self, sheet_id: i64, row: u32, cols: u32) {
        self.push(Request {
            update_borders: Some(UpdateBordersRequest {
                range: GridRange {
                    sheet_id,
                    start_row_index: Some(i64::from(row) - 1),
                    end_row_index: Some(i64::from(row)),
                    start_column_index: Some(0),
                    end_column_index: Some(i64::from(cols)),
                },
                bottom: Some(solid_black_border()),
                right: None,
            }),
            ..Default::default()
        });
    }

    /// Solid border right of one column, spanning `from_row..=to_row`.
    pub fn border_right_of_column(&mut self, sheet_id: i64, col: u32, from_row: u32, to_row: u32) {
        self.push(Request {
            update_borders: Some(UpdateBordersRequest {
                range: GridRange {
                    sheet_id,
                    start_row_index: Some(i64::from(from_row) - 1),
                    end_row_index: Some(i64::from(to_row)),
                    start_column_index: Some(i64::from(col) - 1),
                    end_column_index: Some(i64::from(col)),
                },
                bottom: None,
                right: Some(solid_black_border()),
            }),
            ..Default::default()
        });
    }

    /// Merges the 1-based inclusive cell block into one cell.
    pub fn merge_cells(&mut self, sheet_id: i64, row: u32, from_col: u32, to_col: u32) {
        self.push(Request {
            merge_cells: Some(MergeCellsRequest {
                range: GridRange {
                    sheet_id,
                    start_row_index: Some(i64::from(row) - 1),
                    end_row_index: Some(i64::from(row)),
                    start_column_index: Some(i64::from(from_col) - 1),
                    end_column_index: Some(i64::from(to_col)),
                },
                merge_type: "MERGE_ALL".to_string(),
            }),
            ..Default::default()
        });
    }

    /// Sends everything queued as one batch and clears the buffer.
    ///
    /// Rate limiting retries the same batch with the fixed backoff; any
    /// other error clears the buffer and propagates.
    pub fn flush(
        &mut self,
        api: &dyn SheetsApi,
        spreadsheet_id: &str,
        cancel: &CancelToken,
    ) -> Result<(), SheetsError> {
        if self.queued.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.queued);
        with_rate_limit_retry("batch update", cancel, || {
            api.batch_update(spreadsheet_id, &batch).map(|_| ())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::testing::FakeApi;

    #[test]
    fn empty_flush_issues_no_request() {
        let api = FakeApi::new("sheet");
        let mut buffer = RequestBuffer::new();
        buffer
            .flush(&api, "sheet", &CancelToken::default())
            .unwrap();
        assert!(api.batches().is_empty());
    }

    #[test]
    fn flush_preserves_order_and_clears() {
        let api = FakeApi::new("sheet");
        let mut buffer = RequestBuffer::new();
        buffer.add_formula(1, 1, 1, "=\"first\"".into());
        buffer.add_formula(1, 1, 1, "=\"second\"".into());
        buffer
            .flush(&api, "sheet", &CancelToken::default())
            .unwrap();

        let batches = api.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
        let first = batches[0][0].update_cells.as_ref().unwrap();
        let second = batches[0][1].update_cells.as_ref().unwrap();
        assert_eq!(
            first.rows[0].values[0]
                .user_entered_value
                .as_ref()
                .unwrap()
                .formula_value
                .as_deref(),
            Some("=\"first\"")
        );
        assert_eq!(
            second.rows[0].values[0]
                .user_entered_value
                .as_ref()
                .unwrap()
                .formula_value
                .as_deref(),
            Some("=\"second\"")
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn permanent_error_aborts_and_drops_the_batch() {
        let api = FakeApi::new("sheet");
        api.fail_next_batch(SheetsError::Permanent {
            status: 403,
            message: "forbidden".into(),
        });
        let mut buffer = RequestBuffer::new();
        buffer.add_formula(1, 1, 1, "=1".into());
        let err = buffer
            .flush(&api, "sheet", &CancelToken::default())
            .unwrap_err();
        assert!(matches!(err, SheetsError::Permanent { status: 403, .. }));
        assert!(buffer.is_empty());
    }

    #[test]
    fn cancelled_token_stops_before_sending() {
        let api = FakeApi::new("sheet");
        let cancel = CancelToken::default();
        cancel.cancel();
        let mut buffer = RequestBuffer::new();
        buffer.add_formula(1, 1, 1, "=1".into());
        let err = buffer.flush(&api, "sheet", &cancel).unwrap_err();
        assert!(matches!(err, SheetsError::Cancelled));
        assert!(api.batches().is_empty());
    }

    #[test]
    fn coordinates_are_converted_to_zero_based() {
        let api = FakeApi::new("sheet");
        let mut buffer = RequestBuffer::new();
        buffer.add_formula(9, 3, 7, "=1".into());
        buffer
            .flush(&api, "sheet", &CancelToken::default())
            .unwrap();
        let batches = api.batches();
        let start = &batches[0][0].update_cells.as_ref().unwrap().start;
        assert_eq!(start.sheet_id, 9);
        assert_eq!(start.column_index, 2);
        assert_eq!(start.row_index, 6);
    }
}
