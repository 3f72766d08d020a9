//! Message and ConversationLog domain types.
//!
//! User submits a prompt → a `User` message is logged → the model answers →
//! an `Assistant` message is logged. Messages never change once appended;
//! the log is only ever extended or wiped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Names of the files that were selected when the message was sent
    #[serde(default)]
    pub context_files: Vec<String>,

    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: String, context_files: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            context_files,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>, context_files: Vec<String>) -> Self {
        Self::new(Role::User, content.into(), context_files)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>, context_files: Vec<String>) -> Self {
        Self::new(Role::Assistant, content.into(), context_files)
    }

    /// An assistant message that carries no file context (errors, notices).
    pub fn notice(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content.into(), Vec::new())
    }
}

/// Ordered, append-only record of one conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationLog {
    messages: Vec<Message>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message to the end of the log.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Drop every message.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Plain-text transcript: one `ROLE: content` line per message.
    pub fn export(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}: {}", m.role.as_str().to_uppercase(), m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Download name of a transcript exported at `at`.
pub fn transcript_filename(at: DateTime<Utc>) -> String {
    format!("chat_history_{}.txt", at.timestamp())
}
