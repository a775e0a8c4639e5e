//! Session data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::truncate_chars;

/// Title every session carries until its first user message
pub const DEFAULT_TITLE: &str = "New Chat";

/// Maximum number of characters kept when deriving a title
pub const TITLE_MAX_CHARS: usize = 30;

/// Opaque, unique session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Build the identifier for a creation time in unix milliseconds
    pub fn from_millis(millis: i64) -> Self {
        Self(format!("chat-{}", millis))
    }

    /// The millisecond stamp embedded in the id, if it has the `chat-<n>` shape
    pub fn millis(&self) -> Option<i64> {
        self.0.strip_prefix("chat-").and_then(|n| n.parse().ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("user"),
            Role::Assistant => f.write_str("assistant"),
        }
    }
}

/// One turn in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who wrote the message
    pub role: Role,
    /// Message text
    pub content: String,
    /// Creation time
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a message stamped with the current time
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A conversation session
///
/// The id is the key of the persisted map and is not repeated in the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Display title, derived once from the first user message
    pub title: String,
    /// Messages in chronological order
    messages: Vec<Message>,
    /// Session creation time, used only for ordering
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Create an empty session with the default title
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            created_at,
        }
    }

    /// Messages in the order they were appended
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Append a message, deriving the title if this is the first user message
    pub fn push(&mut self, message: Message) {
        if message.role == Role::User && self.title_pending() {
            self.title = derive_title(&message.content);
        }
        self.messages.push(message);
    }

    /// Whether the title is still waiting for the first user message
    pub fn title_pending(&self) -> bool {
        self.title == DEFAULT_TITLE && !self.messages.iter().any(|m| m.role == Role::User)
    }
}

/// Title for a session whose first user message is `content`
pub fn derive_title(content: &str) -> String {
    truncate_chars(content, TITLE_MAX_CHARS)
}
