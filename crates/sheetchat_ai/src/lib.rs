pub mod actions;
pub mod assistant;
pub mod prompt;
pub mod providers;
pub mod types;

pub use actions::{Action, parse_action};
pub use assistant::{REQUEST_FAILED_MESSAGE, SheetAssistant};
pub use providers::anthropic::AnthropicProvider;
pub use providers::{AiProvider, ProviderError};
pub use types::{ChatMessage, ChatRequest, ChatResponse, FinishReason, MessageRole, TokenUsage};
