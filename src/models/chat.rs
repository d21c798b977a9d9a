use serde::{Deserialize, Serialize};

use crate::api::types::HistoryEntry;

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Ai,
}

impl Sender {
    /// Role name the backend expects in `conversation_history`.
    pub fn backend_role(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Ai => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "type")]
    pub sender: Sender,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            text: text.into(),
        }
    }

    pub fn ai(text: impl Into<String>) -> Self {
        Self {
            sender: Sender::Ai,
            text: text.into(),
        }
    }
}

/// Append-only conversation about the current report.
///
/// Messages are never edited or removed individually; the whole log is
/// dropped when a new report replaces the old one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatLog {
    messages: Vec<ChatMessage>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The last `limit` messages in the shape `/api/ask` accepts.
    pub fn history(&self, limit: usize) -> Vec<HistoryEntry> {
        let start = self.messages.len().saturating_sub(limit);
        self.messages[start..]
            .iter()
            .map(|m| HistoryEntry {
                role: m.sender.backend_role().to_string(),
                content: m.text.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_preserves_insertion_order() {
        let mut log = ChatLog::new();
        log.push(ChatMessage::user("Is my glucose high?"));
        log.push(ChatMessage::ai("Yes, slightly."));
        assert_eq!(log.len(), 2);
        assert_eq!(log.messages()[0].sender, Sender::User);
        assert_eq!(log.messages()[1].text, "Yes, slightly.");
    }

    #[test]
    fn history_keeps_only_the_tail_with_backend_roles() {
        let mut log = ChatLog::new();
        for i in 0..4 {
            log.push(ChatMessage::user(format!("q{i}")));
            log.push(ChatMessage::ai(format!("a{i}")));
        }
        let history = log.history(5);
        assert_eq!(history.len(), 5);
        assert_eq!(history[0].role, "assistant");
        assert_eq!(history[0].content, "a1");
        assert_eq!(history[4].content, "a3");
    }

    #[test]
    fn history_of_short_log_is_whole_log() {
        let mut log = ChatLog::new();
        log.push(ChatMessage::user("hello"));
        let history = log.history(5);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, "user");
    }

    #[test]
    fn message_serializes_with_type_tag() {
        let json = serde_json::to_value(ChatMessage::ai("hi")).unwrap();
        assert_eq!(json["type"], "ai");
        assert_eq!(json["text"], "hi");
    }
}
