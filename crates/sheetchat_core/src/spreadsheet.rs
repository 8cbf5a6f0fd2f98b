//! Spreadsheet entity.
//!
//! A [`Spreadsheet`] is treated as a value: every edit goes through one of the
//! `with_*` methods, which return a new sheet and leave the receiver intact.
//! [`crate::store::SpreadsheetStore`] relies on this to hand out snapshots.

use rand::Rng;
use serde::{Deserialize, Serialize};

const DEFAULT_SHEET_NAME: &str = "Spreadsheet";
const ID_SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate a session-unique id of the form `sheet_<unix-millis>_<suffix>`.
///
/// Uniqueness is probabilistic, which is enough for one process.
pub fn generate_sheet_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let mut rng = rand::rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect();
    format!("sheet_{millis}_{suffix}")
}

/// A formula to be written into a single cell of the remote document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaSpec {
    /// A1-style reference, e.g. `C10`.
    pub cell: String,
    /// Literal formula text, e.g. `=SUM(C2:C9)`.
    pub formula: String,
    #[serde(default)]
    pub description: String,
}

/// Identity of the hosted copy of a sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteLink {
    pub spreadsheet_id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spreadsheet {
    pub id: String,
    pub name: String,
    /// The model's `spreadsheet_type`, if it gave one.
    pub kind: Option<String>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub formulas: Vec<FormulaSpec>,
    pub remote: Option<RemoteLink>,
}

impl Spreadsheet {
    /// Build a new sheet with a fresh id. Rows are padded with empty cells
    /// (or truncated) so each has exactly one cell per column.
    pub fn new(
        kind: Option<String>,
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
        formulas: Vec<FormulaSpec>,
    ) -> Self {
        let name = kind
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .unwrap_or(DEFAULT_SHEET_NAME)
            .to_string();
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();

        Self {
            id: generate_sheet_id(),
            name,
            kind,
            columns,
            rows,
            formulas,
            remote: None,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col).map(String::as_str)
    }

    pub fn remote_id(&self) -> Option<&str> {
        self.remote.as_ref().map(|r| r.spreadsheet_id.as_str())
    }

    pub fn remote_url(&self) -> Option<&str> {
        self.remote.as_ref().map(|r| r.url.as_str())
    }

    /// Header row followed by every data row, the layout written remotely.
    pub fn values_with_header(&self) -> Vec<Vec<String>> {
        let mut values = Vec::with_capacity(self.rows.len() + 1);
        values.push(self.columns.clone());
        values.extend(self.rows.iter().cloned());
        values
    }

    /// Copy with one more row of empty strings.
    pub fn with_empty_row(&self) -> Self {
        let mut next = self.clone();
        next.rows.push(vec![String::new(); self.columns.len()]);
        next
    }

    /// Copy without row `index`, or `None` when the index is out of range or
    /// the row is the last one left.
    pub fn without_row(&self, index: usize) -> Option<Self> {
        if index >= self.rows.len() || self.rows.len() <= 1 {
            return None;
        }
        let mut next = self.clone();
        next.rows.remove(index);
        Some(next)
    }

    /// Copy with a single cell replaced, or `None` when out of range.
    pub fn with_cell(&self, row: usize, col: usize, value: impl Into<String>) -> Option<Self> {
        self.rows.get(row)?.get(col)?;
        let mut next = self.clone();
        next.rows[row][col] = value.into();
        Some(next)
    }

    /// Copy with the whole row set replaced.
    pub fn with_rows(&self, rows: Vec<Vec<String>>) -> Self {
        let mut next = self.clone();
        next.rows = rows;
        next
    }

    /// Copy carrying the remote document identity.
    pub fn with_remote(&self, link: RemoteLink) -> Self {
        let mut next = self.clone();
        next.remote = Some(link);
        next
    }
}
