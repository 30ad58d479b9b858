use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single transcript entry.
///
/// Messages are append-only: once stored they are never mutated or deleted
/// for the lifetime of the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub sender: MessageSender,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSender {
    Visitor,
    System,
}

impl MessageSender {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageSender::Visitor => "visitor",
            MessageSender::System => "system",
        }
    }
}

impl ChatMessage {
    pub fn visitor(text: impl Into<String>) -> Self {
        Self::new(text, MessageSender::Visitor)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(text, MessageSender::System)
    }

    fn new(text: impl Into<String>, sender: MessageSender) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            sender,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visitor_factory_sets_sender_and_id() {
        let before = Utc::now();
        let message = ChatMessage::visitor("hello there");
        let after = Utc::now();

        assert!(!message.id.is_empty());
        assert_eq!(message.sender, MessageSender::Visitor);
        assert_eq!(message.text, "hello there");
        assert!(message.created_at >= before);
        assert!(message.created_at <= after);
    }

    #[test]
    fn system_factory_sets_sender() {
        let message = ChatMessage::system("ack");
        assert_eq!(message.sender, MessageSender::System);
    }

    #[test]
    fn factories_assign_unique_ids() {
        let a = ChatMessage::visitor("one");
        let b = ChatMessage::visitor("one");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn sender_as_str_round_trip() {
        assert_eq!(MessageSender::Visitor.as_str(), "visitor");
        assert_eq!(MessageSender::System.as_str(), "system");
    }
}
