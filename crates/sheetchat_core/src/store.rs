//! Insertion-ordered, copy-on-write spreadsheet store.
//!
//! The store owns every [`Spreadsheet`] as an `Arc`. Mutations build a new
//! sheet and swap the `Arc`, so a snapshot handed out earlier keeps seeing
//! the state it was taken from.

use std::sync::Arc;

use tracing::debug;

use crate::spreadsheet::{RemoteLink, Spreadsheet};

/// Result of a row-removal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowRemoval {
    Removed,
    /// The sheet has a single row, which is kept.
    LastRow,
    OutOfRange,
    UnknownSheet,
}

#[derive(Debug, Clone, Default)]
pub struct SpreadsheetStore {
    sheets: Vec<Arc<Spreadsheet>>,
}

impl SpreadsheetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Adds a sheet at the end of the insertion order and returns its snapshot.
    pub fn insert(&mut self, sheet: Spreadsheet) -> Arc<Spreadsheet> {
        debug!(id = %sheet.id, name = %sheet.name, "inserting spreadsheet");
        let sheet = Arc::new(sheet);
        self.sheets.push(Arc::clone(&sheet));
        sheet
    }

    pub fn remove(&mut self, id: &str) -> Option<Arc<Spreadsheet>> {
        let pos = self.position(id)?;
        debug!(id, "removing spreadsheet");
        Some(self.sheets.remove(pos))
    }

    pub fn get(&self, id: &str) -> Option<Arc<Spreadsheet>> {
        self.position(id).map(|pos| Arc::clone(&self.sheets[pos]))
    }

    /// Sheet at a 0-based display position.
    pub fn get_index(&self, index: usize) -> Option<Arc<Spreadsheet>> {
        self.sheets.get(index).cloned()
    }

    /// The most recently inserted sheet.
    pub fn active(&self) -> Option<Arc<Spreadsheet>> {
        self.sheets.last().cloned()
    }

    /// Every sheet in insertion order.
    pub fn snapshot(&self) -> Vec<Arc<Spreadsheet>> {
        self.sheets.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Spreadsheet>> {
        self.sheets.iter()
    }

    pub fn add_empty_row(&mut self, id: &str) -> bool {
        self.replace_with(id, |sheet| Some(sheet.with_empty_row()))
    }

    pub fn remove_row(&mut self, id: &str, index: usize) -> RowRemoval {
        let Some(sheet) = self.get(id) else {
            return RowRemoval::UnknownSheet;
        };
        if index >= sheet.row_count() {
            return RowRemoval::OutOfRange;
        }
        if sheet.row_count() <= 1 {
            return RowRemoval::LastRow;
        }
        if self.replace_with(id, |sheet| sheet.without_row(index)) {
            RowRemoval::Removed
        } else {
            RowRemoval::OutOfRange
        }
    }

    pub fn update_cell(&mut self, id: &str, row: usize, col: usize, value: &str) -> bool {
        self.replace_with(id, |sheet| sheet.with_cell(row, col, value))
    }

    pub fn replace_rows(&mut self, id: &str, rows: Vec<Vec<String>>) -> bool {
        self.replace_with(id, |sheet| Some(sheet.with_rows(rows)))
    }

    pub fn set_remote(&mut self, id: &str, link: RemoteLink) -> bool {
        self.replace_with(id, |sheet| Some(sheet.with_remote(link)))
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.sheets.iter().position(|s| s.id == id)
    }

    /// Swap in the sheet produced by `edit`; `None` from `edit` leaves the
    /// store untouched. Returns whether a replacement happened.
    fn replace_with<F>(&mut self, id: &str, edit: F) -> bool
    where
        F: FnOnce(&Spreadsheet) -> Option<Spreadsheet>,
    {
        let Some(pos) = self.position(id) else {
            return false;
        };
        match edit(&self.sheets[pos]) {
            Some(next) => {
                self.sheets[pos] = Arc::new(next);
                true
            }
            None => false,
        }
    }
}
