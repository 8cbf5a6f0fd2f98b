//! Anthropic (Claude) provider.
//!
//! Talks to the Anthropic Messages API (`/v1/messages`) with non-streaming
//! completions. The reply text is taken from the first `text` content block.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{AiProvider, ProviderError};
use crate::types::{ChatRequest, ChatResponse, FinishReason, MessageRole, TokenUsage};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const API_BASE: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const REQUEST_TIMEOUT_SECS: u64 = 60;
const MAX_ERROR_BODY: usize = 300;

// ---------------------------------------------------------------------------
// Anthropic API request/response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    model: String,
    usage: ApiUsage,
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorResponse {
    error: Option<AnthropicErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorDetail {
    message: Option<String>,
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// Anthropic API provider (Claude models).
pub struct AnthropicProvider {
    api_key: String,
    endpoint: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_endpoint(api_key, API_BASE)
    }

    /// Create a provider posting to a custom messages endpoint.
    pub fn with_endpoint(api_key: String, endpoint: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            api_key,
            endpoint: endpoint.to_string(),
            client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Convert generic chat messages to Anthropic's format. `System` messages
    /// are folded into the `system` field unless an explicit prompt is set.
    fn build_request(&self, request: &ChatRequest) -> AnthropicRequest {
        let system_from_messages: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect();

        let system = match &request.system_prompt {
            Some(sys) => Some(sys.clone()),
            None if !system_from_messages.is_empty() => Some(system_from_messages.join("\n\n")),
            None => None,
        };

        let messages = request
            .messages
            .iter()
            .filter_map(|m| {
                let role = match m.role {
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                    MessageRole::System => return None,
                };
                Some(AnthropicMessage {
                    role,
                    content: m.content.clone(),
                })
            })
            .collect();

        AnthropicRequest {
            model: request.model.clone(),
            max_tokens: if request.max_tokens > 0 {
                request.max_tokens
            } else {
                DEFAULT_MAX_TOKENS
            },
            messages,
            system,
            temperature: request.temperature,
        }
    }

    /// Map an HTTP status code (and optional body) to a ProviderError.
    fn map_status_error(status: reqwest::StatusCode, body: &str) -> ProviderError {
        match status.as_u16() {
            401 | 403 => ProviderError::InvalidKey,
            429 => ProviderError::RateLimit,
            s if s >= 500 => ProviderError::Other(format!(
                "Anthropic server error {s}: {}",
                truncate_error(body)
            )),
            _ => ProviderError::Other(format!(
                "Anthropic API error {}: {}",
                status,
                truncate_error(body)
            )),
        }
    }

    fn map_reqwest_error(e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_connect() {
            ProviderError::Network(format!("Connection failed: {e}"))
        } else {
            ProviderError::Network(e.to_string())
        }
    }

    fn map_stop_reason(reason: &str) -> FinishReason {
        match reason {
            "end_turn" | "stop" | "stop_sequence" => FinishReason::Stop,
            "max_tokens" => FinishReason::Length,
            "refusal" | "content_filter" => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        }
    }

    fn into_chat_response(data: AnthropicResponse) -> ChatResponse {
        let content = data
            .content
            .into_iter()
            .find(|block| block.block_type == "text")
            .and_then(|block| block.text)
            .unwrap_or_default();

        let finish_reason = data
            .stop_reason
            .as_deref()
            .map(Self::map_stop_reason)
            .unwrap_or(FinishReason::Stop);

        ChatResponse {
            content,
            model: data.model,
            usage: TokenUsage {
                prompt_tokens: data.usage.input_tokens,
                completion_tokens: data.usage.output_tokens,
                total_tokens: data.usage.input_tokens + data.usage.output_tokens,
            },
            finish_reason,
        }
    }
}

#[async_trait]
impl AiProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "Anthropic"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let body = self.build_request(request);
        debug!(
            model = %body.model,
            messages = body.messages.len(),
            "sending Anthropic request"
        );

        let resp = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(Self::map_reqwest_error)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(Self::map_status_error(status, &text));
        }

        let data: AnthropicResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Other(format!("Failed to parse response: {e}")))?;

        Ok(Self::into_chat_response(data))
    }
}

/// Pull the human-readable message out of an Anthropic error body, falling
/// back to a truncated copy of the raw text.
fn truncate_error(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<AnthropicErrorResponse>(body)
        && let Some(message) = parsed.error.and_then(|e| e.message)
    {
        return message;
    }
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let boundary = body
        .char_indices()
        .take_while(|(i, _)| *i < MAX_ERROR_BODY)
        .last()
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(MAX_ERROR_BODY);
    format!("{}...", &body[..boundary])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
