//! Google Sheets API v4 client.
//!
//! Wraps the REST API at `https://sheets.googleapis.com/v4/spreadsheets`
//! using `reqwest` for HTTP and bearer-token authentication. The
//! [`GoogleSheets`] trait is the seam the sync adapter talks to.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Identity of a freshly created document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSpreadsheet {
    pub spreadsheet_id: String,
    /// Numeric id of the first tab (needed for formatting requests).
    pub first_sheet_id: i64,
}

/// Remote operations the sync adapter needs.
#[async_trait]
pub trait GoogleSheets: Send + Sync {
    /// Create a document titled `title` with a single tab named `tab_title`.
    async fn create_spreadsheet(&self, title: &str, tab_title: &str) -> Result<CreatedSpreadsheet>;

    /// Overwrite `range` (A1 notation) with `values`, interpreted as if typed
    /// by a user so formulas evaluate.
    async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &[Vec<String>],
    ) -> Result<()>;

    /// Send a `batchUpdate` with the given request objects.
    async fn batch_update(&self, spreadsheet_id: &str, requests: Vec<Value>) -> Result<()>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateResponse {
    spreadsheet_id: String,
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    #[serde(default)]
    sheet_id: i64,
}

/// Client for the Google Sheets v4 REST API.
pub struct GoogleSheetsClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl GoogleSheetsClient {
    /// Create a new client using the given OAuth access token.
    pub fn new(access_token: &str) -> Self {
        Self::with_base_url(access_token, DEFAULT_BASE_URL)
    }

    /// Create a new client pointing at a custom base URL.
    pub fn with_base_url(access_token: &str, base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        if let Ok(val) = HeaderValue::from_str(&format!("Bearer {access_token}")) {
            headers.insert(AUTHORIZATION, val);
        }

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            base_url,
            api_key: None,
            client,
        }
    }

    /// Attach the project API key as the `key` query parameter.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/{segments...}` with each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid Sheets base URL: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Sheets base URL cannot have path segments"))?
            .extend(segments);
        Ok(url)
    }

    fn with_key(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => req.query(&[("key", key.as_str())]),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let resp = self
            .with_key(req)
            .send()
            .await
            .with_context(|| format!("Sheets {what} request failed"))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Sheets API error ({}): {}", status, body);
        }
        Ok(resp)
    }
}

#[async_trait]
impl GoogleSheets for GoogleSheetsClient {
    async fn create_spreadsheet(&self, title: &str, tab_title: &str) -> Result<CreatedSpreadsheet> {
        let body = serde_json::json!({
            "properties": { "title": title },
            "sheets": [{ "properties": { "title": tab_title } }],
        });

        debug!(title = %title, "creating spreadsheet");

        let url = self.url(&[])?;
        let resp = self
            .send(self.client.post(url).json(&body), "create_spreadsheet")
            .await?;

        let created: CreateResponse = resp
            .json()
            .await
            .context("failed to parse create spreadsheet response")?;

        Ok(CreatedSpreadsheet {
            first_sheet_id: created
                .sheets
                .first()
                .map(|s| s.properties.sheet_id)
                .unwrap_or(0),
            spreadsheet_id: created.spreadsheet_id,
        })
    }

    async fn update_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &[Vec<String>],
    ) -> Result<()> {
        let url = self.url(&[spreadsheet_id, "values", range])?;
        let body = serde_json::json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": values,
        });

        debug!(url = %url, rows = values.len(), "updating Sheets values");

        self.send(
            self.client
                .put(url)
                .query(&[("valueInputOption", "USER_ENTERED")])
                .json(&body),
            "update_values",
        )
        .await?;
        Ok(())
    }

    async fn batch_update(&self, spreadsheet_id: &str, requests: Vec<Value>) -> Result<()> {
        let endpoint = format!("{spreadsheet_id}:batchUpdate");
        let url = self.url(&[endpoint.as_str()])?;
        let body = serde_json::json!({ "requests": requests });

        debug!(url = %url, "sending Sheets batchUpdate");

        self.send(self.client.post(url).json(&body), "batch_update")
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_default_base_url() {
        let client = GoogleSheetsClient::new("tok");
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_client_custom_base_url() {
        let client = GoogleSheetsClient::with_base_url("tok", "https://sheets.test/v4/");
        assert_eq!(client.base_url(), "https://sheets.test/v4");
    }

    #[test]
    fn test_values_url_encodes_range() {
        let client = GoogleSheetsClient::new("tok");
        let url = client.url(&["abc123", "values", "My Tab!A1"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc123/values/My%20Tab!A1"
        );
    }

    #[test]
    fn test_batch_update_url() {
        let client = GoogleSheetsClient::new("tok");
        let url = client.url(&["abc123:batchUpdate"]).unwrap();
        assert!(url.as_str().ends_with("/spreadsheets/abc123:batchUpdate"));
    }

    #[test]
    fn test_blank_api_key_is_ignored() {
        let client = GoogleSheetsClient::new("tok").with_api_key(Some(String::new()));
        assert!(client.api_key.is_none());
        let client = GoogleSheetsClient::new("tok").with_api_key(Some("AIza".into()));
        assert_eq!(client.api_key.as_deref(), Some("AIza"));
    }

    #[test]
    fn test_create_response_deserialization() {
        let json = r#"{
            "spreadsheetId": "1AbC",
            "properties": {"title": "Budget"},
            "sheets": [{"properties": {"sheetId": 917, "title": "Sheet1"}}]
        }"#;
        let resp: CreateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.spreadsheet_id, "1AbC");
        assert_eq!(resp.sheets[0].properties.sheet_id, 917);
    }

    #[test]
    fn test_create_response_without_sheets() {
        let resp: CreateResponse = serde_json::from_str(r#"{"spreadsheetId":"x"}"#).unwrap();
        assert!(resp.sheets.is_empty());
    }
}
