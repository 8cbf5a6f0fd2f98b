//! One-shot loopback listener for the OAuth redirect.
//!
//! After the user approves access, the browser is sent to
//! `http://127.0.0.1:<port>/callback?code=...&state=...`. The listener
//! accepts connections until one carries a callback, answers it with a small
//! HTML page and returns the authorization code.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};
use url::Url;

pub const CALLBACK_PATH: &str = "/callback";
const READ_TIMEOUT: Duration = Duration::from_secs(5);

const SUCCESS_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Signed in</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 4rem;">
  <h1>Signed in to Google</h1>
  <p>You can close this tab and return to SheetChat.</p>
</body>
</html>"#;

const ERROR_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Sign-in failed</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 4rem;">
  <h1>Sign-in failed</h1>
  <p>Return to SheetChat and try again.</p>
</body>
</html>"#;

/// Query parameters carried by a redirect to [`CALLBACK_PATH`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl CallbackParams {
    /// Parse an HTTP request line such as
    /// `GET /callback?code=abc&state=xyz HTTP/1.1`. Returns `None` for any
    /// other path (favicon probes and the like).
    pub fn from_request_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        if parts.next()? != "GET" {
            return None;
        }
        let target = parts.next()?;
        let url = Url::parse("http://127.0.0.1").ok()?.join(target).ok()?;
        if url.path() != CALLBACK_PATH {
            return None;
        }

        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            let value = Some(value.into_owned()).filter(|v| !v.is_empty());
            match key.as_ref() {
                "code" => params.code = value,
                "state" => params.state = value,
                "error" => params.error = value,
                _ => {}
            }
        }
        Some(params)
    }

    /// The authorization code, provided the state matches and no error was
    /// reported.
    pub fn into_code(self, expected_state: &str) -> Result<String> {
        if let Some(err) = self.error {
            bail!("authorization was denied: {err}");
        }
        if self.state.as_deref() != Some(expected_state) {
            bail!("OAuth state mismatch");
        }
        self.code
            .context("OAuth callback did not contain a `code` parameter")
    }
}

/// Listener bound to a loopback port for the duration of one sign-in.
pub struct OAuthCallbackServer {
    listener: TcpListener,
}

impl OAuthCallbackServer {
    /// Bind `127.0.0.1:<port>`. Port 0 picks a free port.
    pub async fn bind(port: u16) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .with_context(|| format!("Failed to bind OAuth callback listener on port {port}"))?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("OAuth callback listener has no local address")
    }

    /// Redirect URI matching the bound port.
    pub fn redirect_uri(&self) -> Result<String> {
        Ok(format!(
            "http://127.0.0.1:{}{CALLBACK_PATH}",
            self.local_addr()?.port()
        ))
    }

    /// Wait for the redirect and return the authorization code. Gives up after
    /// `timeout`.
    pub async fn wait(self, expected_state: &str, timeout: Duration) -> Result<String> {
        info!(addr = ?self.listener.local_addr().ok(), "waiting for OAuth callback");
        tokio::time::timeout(timeout, self.accept_callback())
            .await
            .with_context(|| format!("Timed out waiting for OAuth callback after {timeout:?}"))??
            .into_code(expected_state)
    }

    async fn accept_callback(&self) -> Result<CallbackParams> {
        loop {
            let (mut stream, addr) = self
                .listener
                .accept()
                .await
                .context("Failed to accept connection on OAuth callback listener")?;
            debug!(%addr, "accepted callback connection");

            let line = match read_request_line(&mut stream).await {
                Ok(line) => line,
                Err(e) => {
                    warn!("unreadable callback request: {e:#}");
                    continue;
                }
            };

            match CallbackParams::from_request_line(&line) {
                Some(params) => {
                    let (status, body) = if params.code.is_some() && params.error.is_none() {
                        (200, SUCCESS_HTML)
                    } else {
                        (400, ERROR_HTML)
                    };
                    if let Err(e) = send_response(&mut stream, status, body).await {
                        warn!("failed to answer OAuth callback: {e:#}");
                    }
                    return Ok(params);
                }
                None => {
                    let _ = send_response(&mut stream, 404, "").await;
                }
            }
        }
    }
}

async fn read_request_line(stream: &mut TcpStream) -> Result<String> {
    let mut buf = [0u8; 4096];
    let n = tokio::time::timeout(READ_TIMEOUT, stream.read(&mut buf))
        .await
        .context("read timed out")?
        .context("Failed to read from OAuth callback connection")?;
    let request = String::from_utf8_lossy(&buf[..n]);
    Ok(request.lines().next().unwrap_or_default().to_string())
}

async fn send_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    let reason = match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        _ => "Unknown",
    };

    let response = format!(
        "HTTP/1.1 {status} {reason}\r\n\
         Content-Type: text/html; charset=utf-8\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {body}",
        body.len(),
    );

    stream
        .write_all(response.as_bytes())
        .await
        .context("Failed to write HTTP response to OAuth callback stream")?;
    stream
        .flush()
        .await
        .context("Failed to flush OAuth callback stream")
}
