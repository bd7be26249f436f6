//! Tab provisioning.

use super::client::{
    with_rate_limit_retry, AddSheetRequest, GridProperties, NewSheetProperties, Request,
    SheetsError,
};
use super::Engine;

/// Result of `ensure_tab`: the tab id plus whether this call created it.
/// Setup steps only queue headers and formatting on first creation.
pub struct TabHandle {
    pub id: i64,
    pub created: bool,
}

impl Engine {
    /// Idempotent tab lookup-or-create: an existing title is returned
    /// untouched, otherwise the tab is created with the given grid size.
    pub(crate) fn ensure_tab(
        &mut self,
        title: &str,
        columns: u32,
        rows: u32,
    ) -> Result<TabHandle, SheetsError> {
        if let Some(id) = self.tab_id(title)? {
            return Ok(TabHandle { id, created: false });
        }

        let request = Request {
            add_sheet: Some(AddSheetRequest {
                properties: NewSheetProperties {
                    title: title.to_string(),
                    grid_properties: GridProperties {
                        column_count: columns,
                        row_count: rows,
                    },
                },
            }),
            ..Default::default()
        };
        let requests = [request];
        let response = with_rate_limit_retry("add tab", &self.cancel, || {
            self.api.batch_update(&self.event.spreadsheet_id, &requests)
        })?;

        let id = response
            .replies
            .iter()
            .find_map(|reply| reply.add_sheet.as_ref())
            .map(|reply| reply.properties.sheet_id)
            .ok_or_else(|| {
                SheetsError::InvalidResponse(format!(
                    "addSheet reply carried no sheet id for tab {title:?}"
                ))
            })?;
        Ok(TabHandle { id, created: true })
    }
}

#[cfg(test)]
mod tests {
    use crate::sheets::testing::{engine_with, FakeApi};
    use std::sync::Arc;

    #[test]
    fn existing_tab_is_returned_without_creation() {
        let api = Arc::new(FakeApi::new("sheet").with_tab("Summary"));
        let mut engine = engine_with(api.clone(), false);
        let handle = engine.ensure_tab("Summary", 10, 10).unwrap();
        assert!(!handle.created);
        assert!(api.batches().is_empty());
    }

    #[test]
    fn missing_tab_is_created_with_requested_dimensions() {
        let api = Arc::new(FakeApi::new("sheet"));
        let mut engine = engine_with(api.clone(), false);
        let handle = engine.ensure_tab("Summary", 31, 200).unwrap();
        assert!(handle.created);

        let batches = api.batches();
        let add = batches[0][0].add_sheet.as_ref().unwrap();
        assert_eq!(add.properties.title, "Summary");
        assert_eq!(add.properties.grid_properties.column_count, 31);
        assert_eq!(add.properties.grid_properties.row_count, 200);

        // a second call sees the tab and does nothing
        let again = engine.ensure_tab("Summary", 31, 200).unwrap();
        assert!(!again.created);
        assert_eq!(again.id, handle.id);
        assert_eq!(api.batches().len(), 1);
    }
}
