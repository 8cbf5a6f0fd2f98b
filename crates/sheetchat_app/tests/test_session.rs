use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use sheetchat_ai::{
    AiProvider, ChatRequest, ChatResponse, FinishReason, ProviderError, REQUEST_FAILED_MESSAGE,
    SheetAssistant, TokenUsage,
};
use sheetchat_app::dispatcher::{
    NO_SHEET_TO_SAVE, SIGN_IN_FIRST, SYNC_IN_PROGRESS, UPDATE_SUCCEEDED,
};
use sheetchat_app::{ChatSession, SendOutcome};
use sheetchat_core::SheetChatConfig;
use sheetchat_core::error_handler::SheetChatError;
use sheetchat_core::store::RowRemoval;
use sheetchat_integrations::{CreatedSpreadsheet, GoogleSheets, GoogleSignIn, SheetSync};

// -- Fakes -------------------------------------------------------------------

/// Replies from a script, one per request, optionally after a delay.
struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, ()>>>,
    requests: Mutex<Vec<ChatRequest>>,
    delay: Duration,
}

impl ScriptedProvider {
    fn new(replies: Vec<Result<&str, ()>>) -> Arc<Self> {
        Self::with_delay(replies, Duration::ZERO)
    }

    fn with_delay(replies: Vec<Result<&str, ()>>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(|r| r.map(str::to_string)).collect()),
            requests: Mutex::new(Vec::new()),
            delay,
        })
    }
}

#[async_trait]
impl AiProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.requests.lock().push(request.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let reply = self.replies.lock().pop_front().unwrap_or(Err(()));
        match reply {
            Ok(content) => Ok(ChatResponse {
                content,
                model: request.model.clone(),
                usage: TokenUsage::default(),
                finish_reason: FinishReason::Stop,
            }),
            Err(()) => Err(ProviderError::Network("unreachable".into())),
        }
    }
}

#[derive(Default)]
struct FakeSheets {
    created: Mutex<Vec<String>>,
    writes: Mutex<Vec<(String, String)>>,
    delay: Duration,
}

impl FakeSheets {
    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }
}

#[async_trait]
impl GoogleSheets for FakeSheets {
    async fn create_spreadsheet(&self, title: &str, _tab: &str) -> anyhow::Result<CreatedSpreadsheet> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.created.lock().push(title.to_string());
        Ok(CreatedSpreadsheet {
            spreadsheet_id: "doc-42".into(),
            first_sheet_id: 0,
        })
    }

    async fn update_values(&self, id: &str, range: &str, _values: &[Vec<String>]) -> anyhow::Result<()> {
        self.writes.lock().push((id.to_string(), range.to_string()));
        Ok(())
    }

    async fn batch_update(&self, _id: &str, _requests: Vec<Value>) -> anyhow::Result<()> {
        Ok(())
    }
}

const CREATE_BUDGET: &str = r#"{"action":"create_spreadsheet","spreadsheet_type":"Budget",
    "columns":["Item","Cost"],"sample_data":[["Rent","1200"],["Food","300"]],
    "formulas":[{"cell":"B4","formula":"=SUM(B2:B3)","description":"Total"}],
    "message":"Created a budget."}"#;

fn session_with(provider: Arc<ScriptedProvider>, sync: SheetSync) -> (ChatSession, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let assistant = SheetAssistant::new(provider, "claude-sonnet-4-20250514", 4096);
    (ChatSession::new(assistant, sync, dir.path().to_path_buf()), dir)
}

fn messages(session: &ChatSession) -> Vec<String> {
    session
        .turns_since(0)
        .iter()
        .map(|t| t.content().to_string())
        .collect()
}

// -- Tests -------------------------------------------------------------------

#[tokio::test]
async fn test_send_creates_sheet_and_records_turns() {
    let provider = ScriptedProvider::new(vec![Ok(CREATE_BUDGET)]);
    let (session, _dir) = session_with(provider.clone(), SheetSync::new());

    assert_eq!(session.send("  I need a budget  ").await, SendOutcome::Handled);

    assert_eq!(messages(&session), vec!["I need a budget", "Created a budget."]);
    let sheets = session.sheets();
    assert_eq!(sheets.len(), 1);
    assert_eq!(sheets[0].name, "Budget");
    assert!(!session.is_busy());
}

#[tokio::test]
async fn test_full_history_is_sent_each_turn() {
    let provider = ScriptedProvider::new(vec![
        Ok(CREATE_BUDGET),
        Ok(r#"{"action":"add_row","message":"Added a row."}"#),
    ]);
    let (session, _dir) = session_with(provider.clone(), SheetSync::new());

    session.send("budget please").await;
    session.send("add a row").await;

    let requests = provider.requests.lock();
    assert_eq!(requests[0].messages.len(), 1);
    let second: Vec<&str> = requests[1].messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(second, vec!["budget please", "Created a budget.", "add a row"]);
    assert_eq!(session.sheets()[0].row_count(), 3);
}

#[tokio::test]
async fn test_blank_input_is_ignored() {
    let provider = ScriptedProvider::new(vec![]);
    let (session, _dir) = session_with(provider.clone(), SheetSync::new());
    assert_eq!(session.send("   ").await, SendOutcome::Empty);
    assert_eq!(session.transcript_len(), 0);
    assert!(provider.requests.lock().is_empty());
}

#[tokio::test]
async fn test_non_json_reply_becomes_chat() {
    let provider = ScriptedProvider::new(vec![Ok("Sure! What columns do you want?")]);
    let (session, _dir) = session_with(provider, SheetSync::new());
    session.send("make a sheet").await;
    assert_eq!(
        messages(&session).last().map(String::as_str),
        Some("Sure! What columns do you want?")
    );
    assert!(session.sheets().is_empty());
}

#[tokio::test]
async fn test_provider_failure_keeps_session_alive() {
    let provider = ScriptedProvider::new(vec![Err(()), Ok(CREATE_BUDGET)]);
    let (session, _dir) = session_with(provider, SheetSync::new());

    session.send("first").await;
    assert_eq!(
        messages(&session).last().map(String::as_str),
        Some(REQUEST_FAILED_MESSAGE)
    );
    assert!(!session.is_busy());

    assert_eq!(session.send("second").await, SendOutcome::Handled);
    assert_eq!(session.sheets().len(), 1);
}

#[tokio::test]
async fn test_second_send_while_pending_is_busy() {
    let provider = ScriptedProvider::with_delay(
        vec![Ok(r#"{"action":"chat","message":"hi"}"#)],
        Duration::from_millis(50),
    );
    let (session, _dir) = session_with(provider.clone(), SheetSync::new());

    let (first, second) = tokio::join!(session.send("hello"), session.send("again"));
    assert_eq!(first, SendOutcome::Handled);
    assert_eq!(second, SendOutcome::Busy);

    assert_eq!(provider.requests.lock().len(), 1);
    assert_eq!(messages(&session), vec!["hello", "hi"]);
}

#[tokio::test]
async fn test_save_without_sheet_makes_no_remote_call() {
    let provider = ScriptedProvider::new(vec![Ok(r#"{"action":"save_to_google"}"#)]);
    let fake = Arc::new(FakeSheets::default());
    let (session, _dir) = session_with(provider, SheetSync::connected(fake.clone()));

    session.send("save it").await;
    session.wait_for_sync().await;
    assert_eq!(messages(&session).last().map(String::as_str), Some(NO_SHEET_TO_SAVE));
    assert!(fake.created.lock().is_empty());
}

#[tokio::test]
async fn test_save_then_update_through_chat() {
    let provider = ScriptedProvider::new(vec![
        Ok(CREATE_BUDGET),
        Ok(r#"{"action":"save_to_google","message":"Saving to Google Sheets..."}"#),
        Ok(r#"{"action":"update_google","message":"Updating Google Sheets..."}"#),
    ]);
    let fake = Arc::new(FakeSheets::default());
    let (session, _dir) = session_with(provider, SheetSync::connected(fake.clone()));
    assert!(session.is_google_authed());

    session.send("budget").await;
    session.send("save to google").await;
    session.wait_for_sync().await;

    let sheet = session.sheets()[0].clone();
    assert_eq!(sheet.remote_id(), Some("doc-42"));
    assert_eq!(
        sheet.remote_url(),
        Some("https://docs.google.com/spreadsheets/d/doc-42")
    );
    assert_eq!(fake.created.lock().as_slice(), ["Budget"]);
    assert!(
        messages(&session)
            .last()
            .is_some_and(|m| m.contains("https://docs.google.com/spreadsheets/d/doc-42"))
    );
    assert!(!session.with_state(|s| s.is_syncing(&sheet.id)));

    session.send("push my changes").await;
    session.wait_for_sync().await;
    assert_eq!(messages(&session).last().map(String::as_str), Some(UPDATE_SUCCEEDED));
    let writes = fake.writes.lock();
    // values + formula on create, values on update
    assert_eq!(writes.len(), 3);
    assert_eq!(writes[2], ("doc-42".to_string(), "Sheet1!A1".to_string()));
}

#[tokio::test]
async fn test_sign_out_blocks_saves() {
    let provider = ScriptedProvider::new(vec![Ok(CREATE_BUDGET)]);
    let fake = Arc::new(FakeSheets::default());
    let (session, _dir) = session_with(provider, SheetSync::connected(fake.clone()));

    session.send("budget").await;
    session.sign_out();
    assert!(!session.is_google_authed());

    session.save_sheet(1).unwrap();
    assert_eq!(messages(&session).last().map(String::as_str), Some(SIGN_IN_FIRST));
    assert!(fake.created.lock().is_empty());

    session.connect_google(fake.clone());
    session.save_sheet(1).unwrap();
    session.wait_for_sync().await;
    assert_eq!(fake.created.lock().len(), 1);
}

#[tokio::test]
async fn test_direct_edits_by_position() {
    let provider = ScriptedProvider::new(vec![Ok(CREATE_BUDGET)]);
    let (session, _dir) = session_with(provider, SheetSync::new());
    session.send("budget").await;

    let before = session.sheets()[0].clone();
    assert!(session.set_cell(1, 1, 2, "1500").unwrap());
    let after = session.sheets()[0].clone();

    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(before.cell(0, 1), Some("1200"));
    assert_eq!(after.cell(0, 1), Some("1500"));
    assert_eq!(after.cell(0, 0), Some("Rent"));
    assert_eq!(after.rows[1], before.rows[1]);

    assert!(!session.set_cell(1, 9, 1, "x").unwrap());
    assert!(!session.set_cell(1, 0, 1, "x").unwrap());

    session.add_row(1).unwrap();
    assert_eq!(session.sheets()[0].row_count(), 3);
    assert_eq!(session.remove_row(1, 3).unwrap(), RowRemoval::Removed);
    assert_eq!(session.remove_row(1, 7).unwrap(), RowRemoval::OutOfRange);

    assert!(matches!(session.add_row(2), Err(SheetChatError::UnknownSheet(_))));
    assert!(matches!(session.delete_sheet(0), Err(SheetChatError::UnknownSheet(_))));

    let deleted = session.delete_sheet(1).unwrap();
    assert_eq!(deleted.name, "Budget");
    assert!(session.sheets().is_empty());
}

#[tokio::test]
async fn test_csv_export_writes_file() {
    let provider = ScriptedProvider::new(vec![Ok(CREATE_BUDGET)]);
    let (session, dir) = session_with(provider, SheetSync::new());
    session.send("budget").await;
    session.set_cell(1, 2, 1, r#"a,"b""#).unwrap();

    let path = session.export_csv(1).unwrap();
    assert_eq!(path, dir.path().join("Budget.csv"));
    let content = std::fs::read_to_string(path).unwrap();
    assert_eq!(content, "Item,Cost\nRent,1200\n\"a,\"\"b\"\"\",300\n");
}

#[tokio::test]
async fn test_chat_continues_while_save_is_pending() {
    let provider = ScriptedProvider::new(vec![
        Ok(CREATE_BUDGET),
        Ok(r#"{"action":"save_to_google","message":"Saving to Google Sheets..."}"#),
        Ok(r#"{"action":"chat","message":"Still here."}"#),
        Ok(r#"{"action":"save_to_google"}"#),
    ]);
    let fake = Arc::new(FakeSheets::slow(Duration::from_millis(300)));
    let (session, _dir) = session_with(provider, SheetSync::connected(fake.clone()));

    session.send("budget").await;
    assert_eq!(session.send("save to google").await, SendOutcome::Handled);
    let id = session.sheets()[0].id.clone();
    assert!(session.with_state(|s| s.is_syncing(&id)));

    assert_eq!(session.send("are you there?").await, SendOutcome::Handled);
    assert_eq!(messages(&session).last().map(String::as_str), Some("Still here."));
    assert!(fake.created.lock().is_empty());
    assert!(session.sheets()[0].remote_id().is_none());

    // A second save of the same sheet is refused while the first runs.
    session.send("save again").await;
    assert_eq!(messages(&session).last().map(String::as_str), Some(SYNC_IN_PROGRESS));

    session.wait_for_sync().await;
    assert_eq!(fake.created.lock().len(), 1);
    assert_eq!(session.sheets()[0].remote_id(), Some("doc-42"));
    assert!(!session.with_state(|s| s.is_syncing(&id)));
}

#[tokio::test]
async fn test_changed_fires_when_a_save_finishes() {
    let provider = ScriptedProvider::new(vec![Ok(CREATE_BUDGET)]);
    let fake = Arc::new(FakeSheets::slow(Duration::from_millis(50)));
    let (session, _dir) = session_with(provider, SheetSync::connected(fake));

    session.send("budget").await;
    // Drain the notification left by the send itself.
    session.changed().await;

    session.save_sheet(1).unwrap();
    tokio::time::timeout(Duration::from_secs(5), session.changed())
        .await
        .unwrap();
    assert_eq!(session.sheets()[0].remote_id(), Some("doc-42"));
}

#[tokio::test]
async fn test_sign_in_timeout_is_an_auth_error() {
    let config = SheetChatConfig {
        google_client_id: Some("cid".into()),
        oauth_redirect_port: 0,
        ..SheetChatConfig::default()
    };
    let google = GoogleSignIn::from_config(&config);
    let provider = ScriptedProvider::new(vec![]);
    let (session, _dir) = session_with(provider, SheetSync::new());

    let pending = google.start().await.unwrap();
    let result = session
        .finish_sign_in(pending, Duration::from_millis(50))
        .await;

    assert!(matches!(result, Err(SheetChatError::Auth(_))));
    assert!(!session.is_google_authed());
}
