//! AI provider trait and the Anthropic implementation.

pub mod anthropic;

use async_trait::async_trait;

use crate::types::{ChatRequest, ChatResponse};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that any provider may return.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited")]
    RateLimit,

    #[error("Invalid API key")]
    InvalidKey,

    #[error("Timeout")]
    Timeout,

    #[error("Provider error: {0}")]
    Other(String),
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Interface to a hosted text-generation endpoint.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Human-readable display name.
    fn name(&self) -> &str;

    /// Non-streaming completion.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}
