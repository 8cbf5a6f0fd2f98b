//! Google sign-in for a desktop client.
//!
//! [`GoogleSignIn::start`] binds the loopback listener and builds the consent
//! URL; [`PendingSignIn::finish`] waits for the redirect, exchanges the code
//! and yields a ready [`GoogleSheetsClient`].

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use sheetchat_core::SheetChatConfig;

use super::sheets::GoogleSheetsClient;
use crate::oauth::{OAuthClient, OAuthConfig};
use crate::oauth_callback::OAuthCallbackServer;

/// How long to wait for the user to finish in the browser.
pub const SIGN_IN_TIMEOUT: Duration = Duration::from_secs(180);

/// Google credentials and endpoints taken from [`SheetChatConfig`].
#[derive(Debug, Clone)]
pub struct GoogleSignIn {
    client_id: Option<String>,
    client_secret: Option<String>,
    api_key: Option<String>,
    sheets_base_url: String,
    redirect_port: u16,
}

impl GoogleSignIn {
    pub fn from_config(config: &SheetChatConfig) -> Self {
        Self {
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            api_key: config.google_api_key.clone(),
            sheets_base_url: config.sheets_base_url.clone(),
            redirect_port: config.oauth_redirect_port,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.client_id.is_some()
    }

    /// Sheets client for an already issued access token.
    pub fn client_for_token(&self, access_token: &str) -> GoogleSheetsClient {
        GoogleSheetsClient::with_base_url(access_token, &self.sheets_base_url)
            .with_api_key(self.api_key.clone())
    }

    /// Begin an interactive sign-in.
    pub async fn start(&self) -> Result<PendingSignIn> {
        let client_id = self
            .client_id
            .clone()
            .context("No Google OAuth client id configured")?;

        let server = OAuthCallbackServer::bind(self.redirect_port).await?;
        let redirect_uri = server.redirect_uri()?;
        let oauth = OAuthClient::new(OAuthConfig::google(
            client_id,
            self.client_secret.clone(),
            redirect_uri,
        ));
        let (url, state) = oauth.authorization_url()?;

        Ok(PendingSignIn {
            oauth,
            server,
            state,
            url,
            sign_in: self.clone(),
        })
    }
}

/// A sign-in waiting for the browser redirect.
pub struct PendingSignIn {
    oauth: OAuthClient,
    server: OAuthCallbackServer,
    state: String,
    url: String,
    sign_in: GoogleSignIn,
}

impl PendingSignIn {
    /// URL the user must open.
    pub fn authorization_url(&self) -> &str {
        &self.url
    }

    pub fn redirect_uri(&self) -> &str {
        &self.oauth.config().redirect_uri
    }

    pub async fn finish(self, timeout: Duration) -> Result<GoogleSheetsClient> {
        let code = self.server.wait(&self.state, timeout).await?;
        let token = self.oauth.exchange_code(&code).await?;
        info!(expires_at = ?token.expires_at, "signed in to Google");
        Ok(self.sign_in.client_for_token(&token.access_token))
    }
}
