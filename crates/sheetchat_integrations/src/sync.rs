//! Pushes local spreadsheets to Google Sheets.
//!
//! [`SheetSync`] never owns a [`Spreadsheet`]: it reads a snapshot, talks to
//! the remote service and hands back what the caller should merge. Remote
//! writes are sequential and not transactional; a failure part-way through
//! leaves earlier writes in the document.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{info, warn};

use sheetchat_core::spreadsheet::{RemoteLink, Spreadsheet};

use crate::google::sheets::GoogleSheets;

/// Tab created in every new document; all ranges are addressed through it.
pub const TAB_TITLE: &str = "Sheet1";
const VIEWER_URL_BASE: &str = "https://docs.google.com/spreadsheets/d";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("not signed in to Google")]
    NotAuthenticated,

    #[error("spreadsheet is not linked to a Google Sheet")]
    NotLinked,

    #[error("Google Sheets request failed: {0}")]
    Remote(String),
}

impl SyncError {
    fn remote(e: anyhow::Error) -> Self {
        Self::Remote(format!("{e:#}"))
    }
}

/// Viewer URL for a remote document id.
pub fn viewer_url(spreadsheet_id: &str) -> String {
    format!("{VIEWER_URL_BASE}/{spreadsheet_id}")
}

/// `repeatCell` + `autoResizeDimensions` requests styling row 1 as a bold
/// white-on-blue header and fitting the first `column_count` columns.
pub fn header_format_requests(sheet_id: i64, column_count: usize) -> Vec<Value> {
    vec![
        json!({
            "repeatCell": {
                "range": {
                    "sheetId": sheet_id,
                    "startRowIndex": 0,
                    "endRowIndex": 1
                },
                "cell": {
                    "userEnteredFormat": {
                        "backgroundColor": { "red": 0.2, "green": 0.4, "blue": 0.8 },
                        "textFormat": {
                            "foregroundColor": { "red": 1.0, "green": 1.0, "blue": 1.0 },
                            "bold": true
                        }
                    }
                },
                "fields": "userEnteredFormat(backgroundColor,textFormat)"
            }
        }),
        json!({
            "autoResizeDimensions": {
                "dimensions": {
                    "sheetId": sheet_id,
                    "dimension": "COLUMNS",
                    "startIndex": 0,
                    "endIndex": column_count
                }
            }
        }),
    ]
}

fn tab_range(cell: &str) -> String {
    format!("{TAB_TITLE}!{cell}")
}

/// Sync adapter. Holds the signed-in capability, if any.
#[derive(Default)]
pub struct SheetSync {
    sheets: RwLock<Option<Arc<dyn GoogleSheets>>>,
}

impl SheetSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected(client: Arc<dyn GoogleSheets>) -> Self {
        Self {
            sheets: RwLock::new(Some(client)),
        }
    }

    pub fn connect(&self, client: Arc<dyn GoogleSheets>) {
        *self.sheets.write() = Some(client);
    }

    pub fn disconnect(&self) {
        *self.sheets.write() = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.sheets.read().is_some()
    }

    fn client(&self) -> Result<Arc<dyn GoogleSheets>, SyncError> {
        self.sheets.read().clone().ok_or(SyncError::NotAuthenticated)
    }

    /// Create a new remote document for `sheet` and fill it: values, header
    /// styling, then each formula in order.
    pub async fn create_remote_document(&self, sheet: &Spreadsheet) -> Result<RemoteLink, SyncError> {
        let client = self.client()?;

        let created = client
            .create_spreadsheet(&sheet.name, TAB_TITLE)
            .await
            .map_err(SyncError::remote)?;
        let remote_id = created.spreadsheet_id;
        info!(sheet = %sheet.id, remote = %remote_id, "created Google Sheet");

        client
            .update_values(&remote_id, &tab_range("A1"), &sheet.values_with_header())
            .await
            .map_err(SyncError::remote)?;

        client
            .batch_update(
                &remote_id,
                header_format_requests(created.first_sheet_id, sheet.column_count()),
            )
            .await
            .map_err(SyncError::remote)?;

        for formula in &sheet.formulas {
            client
                .update_values(
                    &remote_id,
                    &tab_range(&formula.cell),
                    &[vec![formula.formula.clone()]],
                )
                .await
                .map_err(|e| {
                    warn!(cell = %formula.cell, "formula write failed");
                    SyncError::remote(e)
                })?;
        }

        Ok(RemoteLink {
            url: viewer_url(&remote_id),
            spreadsheet_id: remote_id,
        })
    }

    /// Overwrite the linked document's header and data rows.
    pub async fn update_remote_document(&self, sheet: &Spreadsheet) -> Result<(), SyncError> {
        let remote_id = sheet.remote_id().ok_or(SyncError::NotLinked)?;
        let client = self.client()?;

        client
            .update_values(remote_id, &tab_range("A1"), &sheet.values_with_header())
            .await
            .map_err(SyncError::remote)?;

        info!(sheet = %sheet.id, remote = %remote_id, "updated Google Sheet");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewer_url() {
        assert_eq!(
            viewer_url("1AbC"),
            "https://docs.google.com/spreadsheets/d/1AbC"
        );
    }

    #[test]
    fn test_header_format_requests() {
        let requests = header_format_requests(42, 5);
        assert_eq!(requests.len(), 2);

        let repeat = &requests[0]["repeatCell"];
        assert_eq!(repeat["range"]["sheetId"], 42);
        assert_eq!(repeat["range"]["endRowIndex"], 1);
        assert_eq!(repeat["cell"]["userEnteredFormat"]["textFormat"]["bold"], true);
        assert_eq!(
            repeat["cell"]["userEnteredFormat"]["backgroundColor"]["blue"],
            0.8
        );

        let resize = &requests[1]["autoResizeDimensions"]["dimensions"];
        assert_eq!(resize["dimension"], "COLUMNS");
        assert_eq!(resize["endIndex"], 5);
    }

    #[test]
    fn test_connect_disconnect() {
        let sync = SheetSync::new();
        assert!(!sync.is_authenticated());
        assert!(matches!(sync.client(), Err(SyncError::NotAuthenticated)));
    }

    #[test]
    fn test_tab_range() {
        assert_eq!(tab_range("B10"), "Sheet1!B10");
    }
}
