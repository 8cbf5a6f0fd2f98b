use thiserror::Error;

/// Top-level application error type.
///
/// None of these end the session; the front end turns them into a chat line
/// via [`SheetChatError::user_message`].
#[derive(Error, Debug)]
pub enum SheetChatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Unknown spreadsheet: {0}")]
    UnknownSheet(String),

    #[error("Export error: {0}")]
    Export(String),
}

/// Classification of errors for logging and user display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Caused by the user's input (bad sheet number, etc.).
    UserError,
    /// Sign-in problems.
    SecurityError,
    /// Local I/O.
    SystemError,
    /// Invalid or missing configuration.
    ConfigError,
}

impl SheetChatError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::ConfigError,
            Self::Auth(_) => ErrorCategory::SecurityError,
            Self::UnknownSheet(_) => ErrorCategory::UserError,
            Self::Export(_) => ErrorCategory::SystemError,
        }
    }

    /// Returns a user-friendly message.
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(msg) => format!("Configuration issue: {msg}"),
            Self::Auth(msg) => format!("Google sign-in failed: {msg}"),
            Self::UnknownSheet(which) => format!("There is no spreadsheet {which}."),
            Self::Export(msg) => format!("Could not export the spreadsheet: {msg}"),
        }
    }
}
