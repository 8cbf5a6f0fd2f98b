//! Drives one chat session: model round-trips, sheet edits from the front
//! end, remote sync and CSV export.
//!
//! State lives behind a `parking_lot::Mutex` that is only ever held between
//! awaits, never across one. Remote creates and updates run on spawned tasks,
//! so a slow save never holds up the next message.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use sheetchat_ai::SheetAssistant;
use sheetchat_core::conversation::ConversationTurn;
use sheetchat_core::error_handler::SheetChatError;
use sheetchat_core::spreadsheet::Spreadsheet;
use sheetchat_core::store::RowRemoval;
use sheetchat_integrations::{GoogleSheets, PendingSignIn, SheetSync};

use crate::dispatcher::{self, AppState, Effect};

/// Result of [`ChatSession::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The message was answered and applied. Remote work it asked for may
    /// still be running.
    Handled,
    /// Blank input; nothing happened.
    Empty,
    /// Another message is still waiting for the model; this one was dropped.
    Busy,
}

/// The parts spawned sync tasks need.
struct Shared {
    state: Mutex<AppState>,
    sync: SheetSync,
    changed: Notify,
}

pub struct ChatSession {
    shared: Arc<Shared>,
    assistant: SheetAssistant,
    export_dir: PathBuf,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ChatSession {
    pub fn new(assistant: SheetAssistant, sync: SheetSync, export_dir: PathBuf) -> Self {
        let state = AppState {
            google_authed: sync.is_authenticated(),
            ..AppState::default()
        };
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                sync,
                changed: Notify::new(),
            }),
            assistant,
            export_dir,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Send one user message: record it, ask the model, apply the resulting
    /// action and start any remote work it asks for.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Empty;
        }

        let request = {
            let mut state = self.shared.state.lock();
            if state.request_in_flight {
                debug!("message dropped; a request is already in flight");
                return SendOutcome::Busy;
            }
            state.request_in_flight = true;
            state.conversation.push_user(text);
            self.assistant.build_request(state.conversation.turns())
        };
        self.shared.changed.notify_one();

        let action = self.assistant.next_action(&request).await;
        info!(action = action.kind(), "model chose action");

        let effects = {
            let mut state = self.shared.state.lock();
            state.request_in_flight = false;
            dispatcher::dispatch(&mut state, action)
        };
        self.shared.changed.notify_one();

        self.spawn_effects(effects);
        SendOutcome::Handled
    }

    fn spawn_effects(&self, effects: Vec<Effect>) {
        if effects.is_empty() {
            return;
        }
        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        for effect in effects {
            let shared = Arc::clone(&self.shared);
            tasks.push(tokio::spawn(async move {
                shared.run_effect(effect).await;
            }));
        }
    }

    /// Resolves after the next state change. Changes made while nobody is
    /// waiting are remembered once.
    pub async fn changed(&self) {
        self.shared.changed.notified().await;
    }

    /// Wait for every remote create/update started so far.
    pub async fn wait_for_sync(&self) {
        loop {
            let pending = std::mem::take(&mut *self.tasks.lock());
            if pending.is_empty() {
                return;
            }
            for task in pending {
                if let Err(e) = task.await {
                    warn!("sync task ended abnormally: {e}");
                }
            }
        }
    }

    // -- Sign-in -------------------------------------------------------------

    pub fn connect_google(&self, client: Arc<dyn GoogleSheets>) {
        self.shared.sync.connect(client);
        self.shared.state.lock().google_authed = true;
        info!("Google Sheets connected");
    }

    /// Wait for the browser redirect of `pending` and connect with the
    /// resulting token. The session is left signed out on failure.
    pub async fn finish_sign_in(
        &self,
        pending: PendingSignIn,
        timeout: Duration,
    ) -> Result<(), SheetChatError> {
        let client = pending
            .finish(timeout)
            .await
            .map_err(|e| SheetChatError::Auth(format!("{e:#}")))?;
        self.connect_google(Arc::new(client));
        Ok(())
    }

    pub fn sign_out(&self) {
        self.shared.sync.disconnect();
        self.shared.state.lock().google_authed = false;
        info!("signed out of Google");
    }

    pub fn is_google_authed(&self) -> bool {
        self.shared.state.lock().google_authed
    }

    // -- Reads ---------------------------------------------------------------

    pub fn is_busy(&self) -> bool {
        self.shared.state.lock().request_in_flight
    }

    pub fn transcript_len(&self) -> usize {
        self.shared.state.lock().conversation.len()
    }

    /// Turns appended at or after `from`.
    pub fn turns_since(&self, from: usize) -> Vec<ConversationTurn> {
        self.shared.state.lock().conversation.since(from).to_vec()
    }

    /// All sheets in display order.
    pub fn sheets(&self) -> Vec<Arc<Spreadsheet>> {
        self.shared.state.lock().store.snapshot()
    }

    /// Run `f` against the current state.
    pub fn with_state<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        f(&self.shared.state.lock())
    }

    // -- Direct sheet edits (1-based positions) ------------------------------

    fn sheet_at(state: &AppState, position: usize) -> Result<Arc<Spreadsheet>, SheetChatError> {
        position
            .checked_sub(1)
            .and_then(|index| state.store.get_index(index))
            .ok_or_else(|| SheetChatError::UnknownSheet(format!("#{position}")))
    }

    pub fn add_row(&self, position: usize) -> Result<(), SheetChatError> {
        let mut state = self.shared.state.lock();
        let sheet = Self::sheet_at(&state, position)?;
        state.store.add_empty_row(&sheet.id);
        Ok(())
    }

    pub fn remove_row(&self, position: usize, row: usize) -> Result<RowRemoval, SheetChatError> {
        let mut state = self.shared.state.lock();
        let sheet = Self::sheet_at(&state, position)?;
        let row_number = i64::try_from(row).unwrap_or(i64::MAX);
        Ok(dispatcher::remove_row(&mut state, &sheet.id, row_number))
    }

    /// Replace one cell. `row` and `col` are 1-based; returns `false` when
    /// either is out of range.
    pub fn set_cell(
        &self,
        position: usize,
        row: usize,
        col: usize,
        value: &str,
    ) -> Result<bool, SheetChatError> {
        let mut state = self.shared.state.lock();
        let sheet = Self::sheet_at(&state, position)?;
        let (Some(row), Some(col)) = (row.checked_sub(1), col.checked_sub(1)) else {
            return Ok(false);
        };
        Ok(state.store.update_cell(&sheet.id, row, col, value))
    }

    pub fn delete_sheet(&self, position: usize) -> Result<Arc<Spreadsheet>, SheetChatError> {
        let mut state = self.shared.state.lock();
        let sheet = Self::sheet_at(&state, position)?;
        state.store.remove(&sheet.id);
        Ok(sheet)
    }

    /// Start pushing a sheet to a new Google Sheet, as the model's
    /// `save_to_google` would for the active sheet.
    pub fn save_sheet(&self, position: usize) -> Result<(), SheetChatError> {
        let effects = {
            let mut state = self.shared.state.lock();
            let sheet = Self::sheet_at(&state, position)?;
            dispatcher::request_create(&mut state, sheet)
        };
        self.spawn_effects(effects);
        Ok(())
    }

    pub fn update_sheet(&self, position: usize) -> Result<(), SheetChatError> {
        let effects = {
            let mut state = self.shared.state.lock();
            let sheet = Self::sheet_at(&state, position)?;
            dispatcher::request_update(&mut state, sheet)
        };
        self.spawn_effects(effects);
        Ok(())
    }

    /// Write a sheet as CSV into the export directory.
    pub fn export_csv(&self, position: usize) -> Result<PathBuf, SheetChatError> {
        let sheet = Self::sheet_at(&self.shared.state.lock(), position)?;
        let path = sheetchat_docs::write_csv(
            &self.export_dir,
            &sheet.name,
            sheet.columns.as_slice(),
            &sheet.rows,
        )
        .map_err(|e| SheetChatError::Export(format!("{e:#}")))?;
        info!(path = %path.display(), "exported CSV");
        Ok(path)
    }
}

impl Shared {
    async fn run_effect(&self, effect: Effect) {
        match effect {
            Effect::CreateRemote(sheet) => {
                let result = self.sync.create_remote_document(&sheet).await;
                dispatcher::complete_create(&mut self.state.lock(), &sheet.id, result);
            }
            Effect::UpdateRemote(sheet) => {
                let result = self.sync.update_remote_document(&sheet).await;
                dispatcher::complete_update(&mut self.state.lock(), &sheet.id, result);
            }
        }
        self.changed.notify_one();
    }
}
