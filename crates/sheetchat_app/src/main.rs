use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

use sheetchat_ai::{AnthropicProvider, SheetAssistant};
use sheetchat_app::render::{self, HELP};
use sheetchat_app::{ChatSession, Command, Input, SendOutcome, parse_input};
use sheetchat_core::config::{ENV_ANTHROPIC_API_KEY, ENV_GOOGLE_CLIENT_ID};
use sheetchat_core::logging;
use sheetchat_core::spreadsheet::Spreadsheet;
use sheetchat_core::store::RowRemoval;
use sheetchat_core::{ErrorCategory, SheetChatConfig, SheetChatError};
use sheetchat_integrations::google::auth::SIGN_IN_TIMEOUT;
use sheetchat_integrations::{GoogleSignIn, SheetSync};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn build_session(config: &SheetChatConfig, sign_in: &GoogleSignIn) -> Result<ChatSession> {
    let api_key = config.anthropic_api_key.clone().ok_or_else(|| {
        SheetChatError::Config(format!("{ENV_ANTHROPIC_API_KEY} is not set"))
    })?;
    let provider = AnthropicProvider::with_endpoint(api_key, &config.anthropic_base_url);
    let assistant = SheetAssistant::new(Arc::new(provider), &config.model, config.max_tokens);
    info!(
        provider = assistant.provider_name(),
        model = assistant.model(),
        "assistant ready"
    );

    let sync = match &config.google_access_token {
        Some(token) => {
            info!("using Google access token from the environment");
            SheetSync::connected(Arc::new(sign_in.client_for_token(token)))
        }
        None => SheetSync::new(),
    };

    let export_dir = match &config.export_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Could not determine current directory")?,
    };

    Ok(ChatSession::new(assistant, sync, export_dir))
}

/// Print every transcript turn appended since `*shown`.
fn flush_transcript(session: &ChatSession, shown: &mut usize) {
    for turn in session.turns_since(*shown) {
        println!("{}", render::render_turn(&turn));
        *shown += 1;
    }
}

fn print_sheet(session: &ChatSession, position: usize) {
    let sheets = session.sheets();
    if let Some(sheet) = position.checked_sub(1).and_then(|i| sheets.get(i)) {
        println!("{}", render::render_sheet(position, sheet));
    }
}

fn report(e: &SheetChatError) {
    match e.category() {
        ErrorCategory::UserError => debug!("{e}"),
        category => warn!(?category, "{e}"),
    }
    println!("{}", e.user_message());
}

/// Sign in on a background task; the browser round-trip can take minutes.
fn start_sign_in(session: &Arc<ChatSession>, google: &GoogleSignIn) {
    let session = Arc::clone(session);
    let google = google.clone();
    tokio::spawn(async move {
        let pending = match google.start().await {
            Ok(pending) => pending,
            Err(e) => return report(&SheetChatError::Auth(format!("{e:#}"))),
        };
        println!(
            "Open this URL in your browser to sign in to Google:\n\n  {}\n",
            pending.authorization_url()
        );
        match session.finish_sign_in(pending, SIGN_IN_TIMEOUT).await {
            Ok(()) => println!("Signed in to Google."),
            Err(e) => report(&e),
        }
    });
}

/// Returns `false` when the user asked to quit.
fn run_command(session: &Arc<ChatSession>, google: &GoogleSignIn, command: Command) -> bool {
    let result = match command {
        Command::Quit => return false,
        Command::Help => {
            println!("{HELP}");
            Ok(())
        }
        Command::Sheets => {
            println!("{}", render::render_sheet_list(session.sheets().as_slice()));
            Ok(())
        }
        Command::Add(n) => session.add_row(n).map(|()| print_sheet(session, n)),
        Command::Remove { sheet, row } => session.remove_row(sheet, row).map(|outcome| {
            match outcome {
                RowRemoval::OutOfRange => println!("Sheet #{sheet} has no row {row}."),
                _ => print_sheet(session, sheet),
            }
        }),
        Command::Set {
            sheet,
            row,
            col,
            value,
        } => session.set_cell(sheet, row, col, &value).map(|changed| {
            if changed {
                print_sheet(session, sheet);
            } else {
                println!("Sheet #{sheet} has no cell at row {row}, column {col}.");
            }
        }),
        Command::Delete(n) => session
            .delete_sheet(n)
            .map(|sheet| println!("Deleted {}.", sheet.name)),
        Command::Save(n) => session.save_sheet(n),
        Command::Update(n) => session.update_sheet(n),
        Command::Csv(n) => session
            .export_csv(n)
            .map(|path| println!("Saved {}", path.display())),
        Command::SignIn => {
            if google.is_configured() {
                start_sign_in(session, google);
            } else {
                println!("Set {ENV_GOOGLE_CLIENT_ID} to enable Google sign-in.");
            }
            Ok(())
        }
        Command::SignOut => {
            session.sign_out();
            println!("Signed out of Google.");
            Ok(())
        }
    };

    if let Err(e) = result {
        report(&e);
    }
    true
}

/// Chat runs on its own task so stdin keeps being read while the model
/// thinks; a second message in that window is reported as busy.
fn start_chat(session: &Arc<ChatSession>, text: String) {
    let session = Arc::clone(session);
    tokio::spawn(async move {
        if session.send(&text).await == SendOutcome::Busy {
            println!("Still working on the previous message.");
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = SheetChatConfig::load()?;
    let _log_guard = logging::init_logging(&config.log_level)?;
    info!("Starting SheetChat v{VERSION}");

    let google = GoogleSignIn::from_config(&config);
    let session = Arc::new(build_session(&config, &google).inspect_err(|e| error!("{e:#}"))?);

    println!("SheetChat v{VERSION}. Describe the spreadsheet you need, or type /help.");
    if session.is_google_authed() {
        println!("Connected to Google Sheets.");
    }

    let mut shown = 0;
    let mut last_shown: Option<Arc<Spreadsheet>> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                match parse_input(&line) {
                    Ok(Input::Empty) => {}
                    Ok(Input::Chat(text)) => start_chat(&session, text),
                    Ok(Input::Command(command)) => {
                        if !run_command(&session, &google, command) {
                            break;
                        }
                        flush_transcript(&session, &mut shown);
                    }
                    Err(e) => println!("{e}"),
                }
            }
            () = session.changed() => {
                flush_transcript(&session, &mut shown);
                // Copy-on-write: a new Arc for the last sheet means it changed.
                let sheets = session.sheets();
                if let Some(last) = sheets.last()
                    && !last_shown.as_ref().is_some_and(|prev| Arc::ptr_eq(prev, last))
                {
                    println!("{}", render::render_sheet(sheets.len(), last));
                    last_shown = Some(Arc::clone(last));
                }
            }
        }
    }

    session.wait_for_sync().await;
    info!("SheetChat exiting");
    Ok(())
}
