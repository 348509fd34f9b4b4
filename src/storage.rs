//! Conversation Storage
//!
//! Persists conversation records as a single JSON file, most recent first,
//! keeping at most fifty records.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::conversation::Conversation;
use crate::error::KrrishResult;

/// Maximum number of conversations kept on disk
pub const MAX_CONVERSATIONS: usize = 50;

/// File-backed conversation history
#[derive(Debug, Clone)]
pub struct ChatStorage {
    path: PathBuf,
}

impl ChatStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Storage at the default data location
    pub fn open_default() -> Self {
        Self::new(default_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all conversations, most recent first
    ///
    /// A missing file is an empty history; an unreadable one is logged and
    /// treated as empty.
    pub fn get_conversations(&self) -> Vec<Conversation> {
        if !self.path.exists() {
            return Vec::new();
        }
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                warn!("⚠️ Could not read chat history {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };
        match serde_json::from_str(&content) {
            Ok(conversations) => conversations,
            Err(e) => {
                warn!("⚠️ Chat history corrupted, ignoring: {}", e);
                Vec::new()
            }
        }
    }

    /// Insert or replace a conversation
    pub fn save_conversation(&self, conversation: &Conversation) -> KrrishResult<()> {
        let mut conversations = self.get_conversations();
        match conversations.iter().position(|c| c.id == conversation.id) {
            Some(idx) => conversations[idx] = conversation.clone(),
            None => conversations.insert(0, conversation.clone()),
        }
        conversations.truncate(MAX_CONVERSATIONS);
        debug!(
            "Saving conversation '{}' ({} messages)",
            conversation.id,
            conversation.len()
        );
        self.write_all(&conversations)
    }

    /// Remove a conversation by id
    pub fn delete_conversation(&self, id: &str) -> KrrishResult<()> {
        let mut conversations = self.get_conversations();
        conversations.retain(|c| c.id != id);
        self.write_all(&conversations)
    }

    fn write_all(&self, conversations: &[Conversation]) -> KrrishResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string(conversations)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

pub fn default_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("krrish")
        .join("chat-history.json")
}
