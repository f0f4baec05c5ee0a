//! Message and Conversation types exchanged with the language model.
//!
//! The router itself only deals in prompt strings; these types exist for the
//! reply generator, which keeps a short rolling conversation with the model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The streamer, chat, or whatever the bot is reacting to
    User,
    /// The bot
    Assistant,
    /// Persona and situation context
    System,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// A rolling conversation that keeps at most `capacity` messages,
/// evicting the oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    messages: VecDeque<Message>,
    capacity: usize,
}

impl Conversation {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Add a message, evicting from the front once over capacity.
    pub fn push(&mut self, message: Message) {
        self.messages.push_back(message);
        while self.messages.len() > self.capacity {
            self.messages.pop_front();
        }
    }

    /// Drop the most recent message (used when a request fails so the
    /// unanswered prompt does not linger).
    pub fn pop_last(&mut self) -> Option<Message> {
        self.messages.pop_back()
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::with_capacity(8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, nami!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello, nami!");
    }

    #[test]
    fn conversation_evicts_oldest() {
        let mut conv = Conversation::with_capacity(3);
        for i in 0..5 {
            conv.push(Message::user(format!("m{i}")));
        }
        let contents: Vec<_> = conv.messages().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m2", "m3", "m4"]);
    }

    #[test]
    fn pop_last_removes_newest() {
        let mut conv = Conversation::default();
        conv.push(Message::user("question"));
        conv.push(Message::user("unanswered"));
        assert_eq!(conv.pop_last().unwrap().content, "unanswered");
        assert_eq!(conv.len(), 1);
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }
}
