use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Turns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single chat turn. Immutable once appended to a [`ConversationLog`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    role: TurnRole,
    content: String,
    timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn role(&self) -> TurnRole {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

// ---------------------------------------------------------------------------
// ConversationLog
// ---------------------------------------------------------------------------

/// Append-only, ordered transcript. The whole log is sent as model context on
/// every request; there is no truncation.
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    turns: Vec<ConversationTurn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: TurnRole, content: impl Into<String>) -> &ConversationTurn {
        self.turns.push(ConversationTurn {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        });
        // Just pushed, so the log is non-empty.
        &self.turns[self.turns.len() - 1]
    }

    pub fn push_user(&mut self, content: impl Into<String>) -> &ConversationTurn {
        self.push(TurnRole::User, content)
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) -> &ConversationTurn {
        self.push(TurnRole::Assistant, content)
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Turns appended at or after position `from` (for incremental rendering).
    pub fn since(&self, from: usize) -> &[ConversationTurn] {
        &self.turns[from.min(self.turns.len())..]
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }
}
