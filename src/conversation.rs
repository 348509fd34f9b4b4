//! Conversation Log
//!
//! Append-only sequence of utterances for the current session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Maximum characters kept in a generated title
const TITLE_MAX_CHARS: usize = 30;

/// Disambiguates conversations created within the same millisecond
static CONVERSATION_SEQ: AtomicU64 = AtomicU64::new(0);

/// One spoken or typed turn. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utterance {
    pub id: String,
    pub text: String,
    #[serde(rename = "isUser")]
    pub is_from_user: bool,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Utterance {
    fn new(id: String, text: impl Into<String>, is_from_user: bool) -> Self {
        Self {
            id,
            text: text.into(),
            is_from_user,
            created_at: Utc::now(),
        }
    }
}

/// Ordered conversation with its persisted metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<Utterance>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Start a fresh conversation seeded with the assistant greeting
    pub fn new(greeting: &str) -> Self {
        let now = Utc::now();
        let mut conversation = Self {
            id: format!(
                "conv-{}-{}",
                now.timestamp_millis(),
                CONVERSATION_SEQ.fetch_add(1, Ordering::Relaxed)
            ),
            title: String::new(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        conversation.push(greeting, false);
        conversation.title = conversation.generate_title();
        conversation
    }

    /// Append a user turn
    pub fn append_user(&mut self, text: impl Into<String>) -> &Utterance {
        self.push(text, true)
    }

    /// Append an assistant turn
    pub fn append_assistant(&mut self, text: impl Into<String>) -> &Utterance {
        self.push(text, false)
    }

    fn push(&mut self, text: impl Into<String>, is_from_user: bool) -> &Utterance {
        let now = Utc::now();
        let id = format!("{}-{}", now.timestamp_millis(), self.messages.len());
        self.messages.push(Utterance::new(id, text, is_from_user));
        self.updated_at = now;
        if is_from_user && self.messages.iter().filter(|m| m.is_from_user).count() == 1 {
            self.title = self.generate_title();
        }
        &self.messages[self.messages.len() - 1]
    }

    /// The `limit` most recent utterances, oldest first
    pub fn recent(&self, limit: usize) -> &[Utterance] {
        let start = self.messages.len().saturating_sub(limit);
        &self.messages[start..]
    }

    /// True once anything beyond the greeting has been said
    pub fn has_exchange(&self) -> bool {
        self.messages.len() > 1
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Utterance> {
        self.messages.last()
    }

    /// Title from the first user utterance
    pub fn generate_title(&self) -> String {
        let Some(first) = self.messages.iter().find(|m| m.is_from_user) else {
            return "New Conversation".to_string();
        };
        let text = first.text.trim();
        if text.chars().count() <= TITLE_MAX_CHARS {
            text.to_string()
        } else {
            let head: String = text.chars().take(TITLE_MAX_CHARS).collect();
            format!("{head}...")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_conversation_has_greeting() {
        let conv = Conversation::new("Hello!");
        assert_eq!(conv.len(), 1);
        assert!(!conv.messages[0].is_from_user);
        assert!(!conv.has_exchange());
        assert_eq!(conv.title, "New Conversation");
    }

    #[test]
    fn test_recent_window_keeps_order() {
        let mut conv = Conversation::new("Hello!");
        for i in 0..12 {
            conv.append_user(format!("question {i}"));
        }
        let recent = conv.recent(10);
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].text, "question 2");
        assert_eq!(recent[9].text, "question 11");
        assert_eq!(conv.recent(100).len(), 13);
    }

    #[test]
    fn test_title_truncation() {
        let mut conv = Conversation::new("Hello!");
        conv.append_user("Hey Krrish, tell me everything about the monsoon season");
        conv.append_user("second question");
        assert_eq!(conv.title, "Hey Krrish, tell me everything...");

        let mut short = Conversation::new("Hello!");
        short.append_user("  what time is it  ");
        assert_eq!(short.title, "what time is it");
    }

    #[test]
    fn test_conversation_ids_are_unique() {
        let a = Conversation::new("Hello!");
        let b = Conversation::new("Hello!");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_utterance_wire_names() {
        let mut conv = Conversation::new("Hello!");
        conv.append_user("hi");
        let json = serde_json::to_value(conv.last().unwrap()).unwrap();
        assert_eq!(json["isUser"], true);
        assert!(json["timestamp"].is_string());
    }
}
