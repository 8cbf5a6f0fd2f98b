use std::sync::Arc;

use tracing::{debug, warn};

use sheetchat_core::conversation::ConversationTurn;

use crate::actions::{Action, parse_action};
use crate::prompt::SYSTEM_PROMPT;
use crate::providers::AiProvider;
use crate::types::{ChatMessage, ChatRequest};

/// Shown when the model endpoint itself fails.
pub const REQUEST_FAILED_MESSAGE: &str = "Sorry, I encountered an error processing your request.";

/// Turns a conversation into the next [`Action`] by asking the model.
pub struct SheetAssistant {
    provider: Arc<dyn AiProvider>,
    model: String,
    max_tokens: u32,
}

impl SheetAssistant {
    pub fn new(provider: Arc<dyn AiProvider>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Build the request for the given history. The history must already end
    /// with the new user turn; nothing is pruned.
    pub fn build_request(&self, history: &[ConversationTurn]) -> ChatRequest {
        ChatRequest {
            messages: history.iter().map(ChatMessage::from).collect(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: None,
            system_prompt: Some(SYSTEM_PROMPT.to_string()),
        }
    }

    /// Ask the model for the next action. Provider failures become
    /// [`Action::Error`]; unparseable replies become [`Action::Chat`].
    pub async fn next_action(&self, request: &ChatRequest) -> Action {
        match self.provider.chat(request).await {
            Ok(response) => {
                debug!(
                    model = %response.model,
                    tokens = response.usage.total_tokens,
                    "model replied"
                );
                parse_action(&response.content)
            }
            Err(e) => {
                warn!(provider = self.provider.name(), "model request failed: {e}");
                Action::error(REQUEST_FAILED_MESSAGE)
            }
        }
    }
}
