pub mod google;
pub mod oauth;
pub mod oauth_callback;
pub mod sync;

pub use google::{
    CreatedSpreadsheet, GoogleSheets, GoogleSheetsClient, GoogleSignIn, PendingSignIn,
};
pub use oauth::{OAuthClient, OAuthConfig, OAuthToken};
pub use oauth_callback::{CallbackParams, OAuthCallbackServer};
pub use sync::{SheetSync, SyncError, viewer_url};
