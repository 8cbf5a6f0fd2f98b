//! Applies decoded actions to the in-memory state.
//!
//! [`dispatch`] never performs I/O. Work that needs the network comes back as
//! [`Effect`]s; the session runs them and reports the outcome through
//! [`complete_create`] / [`complete_update`].

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use sheetchat_ai::Action;
use sheetchat_core::conversation::ConversationLog;
use sheetchat_core::spreadsheet::{RemoteLink, Spreadsheet};
use sheetchat_core::store::{RowRemoval, SpreadsheetStore};
use sheetchat_integrations::SyncError;

pub const NO_SHEET_FOR_ROW: &str = "There is no spreadsheet to add a row to.";
pub const LAST_ROW_KEPT: &str = "A spreadsheet needs at least one row, so I kept it.";
pub const NO_SHEET_TO_SAVE: &str = "No spreadsheet to save. Please create one first.";
pub const SIGN_IN_FIRST: &str = "Please sign in to Google first to save to Google Sheets.";
pub const NO_SHEET_TO_UPDATE: &str = "No spreadsheet to update.";
pub const NOT_LINKED: &str = "This spreadsheet is not linked to Google Sheets yet. Save it first!";
pub const SYNC_IN_PROGRESS: &str =
    "This spreadsheet is already syncing with Google Sheets. Please wait a moment.";
pub const CREATE_FAILED: &str =
    "Sorry, there was an error creating the Google Sheet. Please try again.";
pub const UPDATE_FAILED: &str = "Sorry, there was an error updating the Google Sheet.";
pub const UPDATE_SUCCEEDED: &str = "✅ Google Sheet updated successfully!";

pub fn created_message(url: &str) -> String {
    format!("✅ Successfully created Google Sheet! You can view it here: {url}")
}

/// Everything the reducer may touch.
#[derive(Debug, Default)]
pub struct AppState {
    pub conversation: ConversationLog,
    pub store: SpreadsheetStore,
    pub google_authed: bool,
    pub request_in_flight: bool,
    /// Ids of sheets with a remote create/update pending.
    pub syncing: HashSet<String>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_syncing(&self, sheet_id: &str) -> bool {
        self.syncing.contains(sheet_id)
    }
}

/// Remote work requested by the reducer, carrying the snapshot to push.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    CreateRemote(Arc<Spreadsheet>),
    UpdateRemote(Arc<Spreadsheet>),
}

impl Effect {
    pub fn sheet(&self) -> &Arc<Spreadsheet> {
        match self {
            Self::CreateRemote(sheet) | Self::UpdateRemote(sheet) => sheet,
        }
    }
}

pub fn dispatch(state: &mut AppState, action: Action) -> Vec<Effect> {
    // An empty turn would be resent with every later request.
    if let Some(message) = action.message().filter(|m| !m.is_empty()) {
        state.conversation.push_assistant(message);
    }
    debug!(action = action.kind(), sheets = state.store.len(), "dispatching");

    let active = state.store.active();

    match action {
        Action::CreateSpreadsheet {
            spreadsheet_type,
            columns,
            sample_data,
            formulas,
            ..
        } => {
            state.store.insert(Spreadsheet::new(
                spreadsheet_type,
                columns,
                sample_data,
                formulas,
            ));
            Vec::new()
        }
        Action::AddRow { .. } => {
            match active {
                Some(sheet) => {
                    state.store.add_empty_row(&sheet.id);
                }
                None => {
                    state.conversation.push_assistant(NO_SHEET_FOR_ROW);
                }
            }
            Vec::new()
        }
        Action::RemoveRow { row_number, .. } => {
            if let Some(sheet) = active {
                remove_row(state, &sheet.id, row_number);
            }
            Vec::new()
        }
        Action::DeleteSpreadsheet { .. } => {
            if let Some(sheet) = active {
                state.store.remove(&sheet.id);
            }
            Vec::new()
        }
        Action::SaveToGoogle { .. } => match active {
            Some(sheet) => request_create(state, sheet),
            None => {
                state.conversation.push_assistant(NO_SHEET_TO_SAVE);
                Vec::new()
            }
        },
        Action::UpdateGoogle { .. } => match active {
            Some(sheet) => request_update(state, sheet),
            None => {
                state.conversation.push_assistant(NO_SHEET_TO_UPDATE);
                Vec::new()
            }
        },
        Action::Chat { .. } | Action::Error { .. } => Vec::new(),
    }
}

/// Remove the 1-based `row_number` from a sheet. Out-of-range numbers are
/// ignored; the last remaining row is kept with an advisory.
pub fn remove_row(state: &mut AppState, sheet_id: &str, row_number: i64) -> RowRemoval {
    let Some(index) = row_number
        .checked_sub(1)
        .and_then(|n| usize::try_from(n).ok())
    else {
        return RowRemoval::OutOfRange;
    };
    let outcome = state.store.remove_row(sheet_id, index);
    if outcome == RowRemoval::LastRow {
        state.conversation.push_assistant(LAST_ROW_KEPT);
    }
    outcome
}

/// Guard checks for pushing `sheet` to a new remote document.
pub fn request_create(state: &mut AppState, sheet: Arc<Spreadsheet>) -> Vec<Effect> {
    if !state.google_authed {
        state.conversation.push_assistant(SIGN_IN_FIRST);
        return Vec::new();
    }
    if !state.syncing.insert(sheet.id.clone()) {
        state.conversation.push_assistant(SYNC_IN_PROGRESS);
        return Vec::new();
    }
    vec![Effect::CreateRemote(sheet)]
}

/// Guard checks for overwriting the linked remote document of `sheet`.
pub fn request_update(state: &mut AppState, sheet: Arc<Spreadsheet>) -> Vec<Effect> {
    if sheet.remote_id().is_none() {
        state.conversation.push_assistant(NOT_LINKED);
        return Vec::new();
    }
    if !state.google_authed {
        state.conversation.push_assistant(SIGN_IN_FIRST);
        return Vec::new();
    }
    if !state.syncing.insert(sheet.id.clone()) {
        state.conversation.push_assistant(SYNC_IN_PROGRESS);
        return Vec::new();
    }
    vec![Effect::UpdateRemote(sheet)]
}

/// Merge the outcome of [`Effect::CreateRemote`]. Only the remote link is
/// written back, so edits made while the request was in flight survive. A
/// sheet deleted in the meantime is left deleted.
pub fn complete_create(state: &mut AppState, sheet_id: &str, result: Result<RemoteLink, SyncError>) {
    state.syncing.remove(sheet_id);
    match result {
        Ok(link) => {
            let message = created_message(&link.url);
            if !state.store.set_remote(sheet_id, link) {
                debug!(sheet = sheet_id, "sheet removed before its remote copy was created");
            }
            state.conversation.push_assistant(message);
        }
        Err(SyncError::NotAuthenticated) => {
            state.google_authed = false;
            state.conversation.push_assistant(SIGN_IN_FIRST);
        }
        Err(e) => {
            warn!(sheet = sheet_id, "creating Google Sheet failed: {e}");
            state.conversation.push_assistant(CREATE_FAILED);
        }
    }
}

pub fn complete_update(state: &mut AppState, sheet_id: &str, result: Result<(), SyncError>) {
    state.syncing.remove(sheet_id);
    let message = match result {
        Ok(()) => UPDATE_SUCCEEDED,
        Err(SyncError::NotLinked) => NOT_LINKED,
        Err(SyncError::NotAuthenticated) => {
            state.google_authed = false;
            SIGN_IN_FIRST
        }
        Err(e) => {
            warn!(sheet = sheet_id, "updating Google Sheet failed: {e}");
            UPDATE_FAILED
        }
    };
    state.conversation.push_assistant(message);
}
