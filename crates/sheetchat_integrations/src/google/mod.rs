pub mod auth;
pub mod sheets;

pub use auth::{GoogleSignIn, PendingSignIn};
pub use sheets::{CreatedSpreadsheet, GoogleSheets, GoogleSheetsClient};
