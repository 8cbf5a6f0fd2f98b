pub mod config;
pub mod conversation;
pub mod error_handler;
pub mod logging;
pub mod spreadsheet;
pub mod store;

pub use config::SheetChatConfig;
pub use conversation::{ConversationLog, ConversationTurn, TurnRole};
pub use error_handler::{ErrorCategory, SheetChatError};
pub use spreadsheet::{FormulaSpec, RemoteLink, Spreadsheet, generate_sheet_id};
pub use store::{RowRemoval, SpreadsheetStore};
