//! OAuth 2.0 Authorization Code flow with PKCE.
//!
//! Only what Google sign-in for a desktop client needs: build the consent
//! URL, then trade the returned code for an access token.

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Scopes needed to create documents and write their cells.
pub const GOOGLE_SHEETS_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets",
    "https://www.googleapis.com/auth/drive.file",
];

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub auth_url: String,
    pub token_url: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    /// Google endpoints and Sheets scopes for the given desktop client.
    pub fn google(
        client_id: impl Into<String>,
        client_secret: Option<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.filter(|s| !s.is_empty()),
            auth_url: GOOGLE_AUTH_URL.into(),
            token_url: GOOGLE_TOKEN_URL.into(),
            redirect_uri: redirect_uri.into(),
            scopes: GOOGLE_SHEETS_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OAuthToken {
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub token_type: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    token_type: Option<String>,
}

/// Random code verifier of 43-128 unreserved characters.
fn generate_code_verifier() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";
    let mut rng = rand::rng();
    let len = rng.random_range(43..=128);
    (0..len)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}

/// S256 challenge: BASE64URL(SHA256(verifier)) without padding.
fn compute_code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn generate_state() -> String {
    let bytes: [u8; 16] = rand::random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// One sign-in attempt. The verifier lives as long as the client, so the
/// same instance must build the URL and exchange the code.
pub struct OAuthClient {
    config: OAuthConfig,
    client: Client,
    code_verifier: String,
}

impl OAuthClient {
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            config,
            client: Client::new(),
            code_verifier: generate_code_verifier(),
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Build the consent URL. Returns `(url, state)`; the callback must echo
    /// `state` back.
    pub fn authorization_url(&self) -> Result<(String, String)> {
        let state = generate_state();
        let challenge = compute_code_challenge(&self.code_verifier);
        let scope = self.config.scopes.join(" ");

        let url = Url::parse_with_params(
            &self.config.auth_url,
            &[
                ("response_type", "code"),
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("scope", scope.as_str()),
                ("state", state.as_str()),
                ("code_challenge", challenge.as_str()),
                ("code_challenge_method", "S256"),
            ],
        )
        .with_context(|| format!("invalid authorization URL: {}", self.config.auth_url))?;

        debug!(url = %url, "built authorization URL");
        Ok((url.into(), state))
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<OAuthToken> {
        let mut params = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", self.config.redirect_uri.clone()),
            ("client_id", self.config.client_id.clone()),
            ("code_verifier", self.code_verifier.clone()),
        ];

        if let Some(ref secret) = self.config.client_secret {
            params.push(("client_secret", secret.clone()));
        }

        let resp = self
            .client
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await
            .context("token exchange request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("token exchange failed ({}): {}", status, body);
        }

        let raw: TokenResponse = resp
            .json()
            .await
            .context("failed to parse token response")?;
        Ok(to_oauth_token(raw))
    }

    #[cfg(test)]
    fn code_verifier(&self) -> &str {
        &self.code_verifier
    }
}

fn to_oauth_token(raw: TokenResponse) -> OAuthToken {
    let expires_at = raw
        .expires_in
        .map(|secs| Utc::now() + chrono::Duration::seconds(secs));

    OAuthToken {
        access_token: raw.access_token,
        expires_at,
        token_type: raw.token_type.unwrap_or_else(|| "Bearer".to_string()),
    }
}
