//! Long-term memory collaborator
//!
//! The assistant reads what it remembers about a user when a session starts
//! and hands the conversation back when the session ends. Storage lives
//! behind [`MemoryClient`]:
//!
//! - [`InMemoryClient`]: process-local, for tests and offline runs
//! - [`ServerMemoryClient`]: hosted memory service over HTTP
//!
//! [`MemoryContext`] does the session-side bookkeeping: it renders the
//! opening message from stored memories and filters the transcript before
//! it is persisted.

mod inmemory;
mod server;

pub use inmemory::InMemoryClient;
pub use server::ServerMemoryClient;

use crate::config::{MemoryConfig, MemoryMode};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// One stored memory about a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Memory text
    pub memory: String,

    /// When the memory was last updated
    pub updated_at: DateTime<Utc>,
}

/// A transcript message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `user`, `assistant`, `system`, ...
    pub role: String,

    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// Create a message
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// User message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    /// Assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// Storage for per-user memories
#[async_trait]
pub trait MemoryClient: Send + Sync {
    /// Every memory stored for `user_id`
    async fn get_all(&self, user_id: &str) -> Result<Vec<MemoryEntry>>;

    /// Hand conversation messages to the store for `user_id`
    async fn add(&self, messages: &[ChatMessage], user_id: &str) -> Result<()>;
}

/// Build the memory client named by configuration
pub fn from_config(config: &MemoryConfig) -> Result<Arc<dyn MemoryClient>> {
    match &config.mode {
        MemoryMode::InMemory => Ok(Arc::new(InMemoryClient::new())),
        MemoryMode::Server { url, api_key } => Ok(Arc::new(ServerMemoryClient::new(
            url.clone(),
            api_key.clone(),
            config.timeout,
        )?)),
    }
}

#[derive(Serialize)]
struct MemoryView<'a> {
    memory: &'a str,
    updated_at: &'a DateTime<Utc>,
}

/// Memories injected at session start, remembered so they are not stored twice
#[derive(Debug, Clone, Default)]
pub struct MemoryContext {
    user_id: String,
    memory_json: Option<String>,
    opening_message: Option<ChatMessage>,
}

impl MemoryContext {
    /// Fetch the user's memories and build the opening message
    pub async fn load(client: &dyn MemoryClient, user_id: &str) -> Result<Self> {
        let entries = client.get_all(user_id).await?;
        if entries.is_empty() {
            debug!(user_id, "No stored memories");
            return Ok(Self::empty(user_id));
        }

        let views: Vec<MemoryView<'_>> = entries
            .iter()
            .map(|e| MemoryView {
                memory: &e.memory,
                updated_at: &e.updated_at,
            })
            .collect();
        let memory_json = serde_json::to_string(&views)?;
        info!(user_id, count = entries.len(), "Loaded memories");

        let opening_message = ChatMessage::assistant(format!(
            "The following is a list of memories from previous conversations with the user {}: {}",
            user_id, memory_json
        ));

        Ok(Self {
            user_id: user_id.to_string(),
            memory_json: Some(memory_json),
            opening_message: Some(opening_message),
        })
    }

    /// Context for `user_id` with nothing loaded
    pub fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            ..Default::default()
        }
    }

    /// User the memories belong to
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Serialized memories, if any were loaded
    pub fn memory_json(&self) -> Option<&str> {
        self.memory_json.as_deref()
    }

    /// Message that seeds the conversation, if any memories were loaded
    pub fn opening_message(&self) -> Option<&ChatMessage> {
        self.opening_message.as_ref()
    }

    /// Messages from `transcript` worth storing
    pub fn filter_transcript(&self, transcript: &[ChatMessage]) -> Vec<ChatMessage> {
        transcript
            .iter()
            .filter(|m| match &self.memory_json {
                Some(json) => !m.content.contains(json.as_str()),
                None => true,
            })
            .filter(|m| m.role == "user" || m.role == "assistant")
            .map(|m| ChatMessage::new(m.role.clone(), m.content.trim()))
            .collect()
    }

    /// Store the conversation, skipping the injected memories.
    ///
    /// Returns the number of messages handed to the client.
    pub async fn persist(&self, client: &dyn MemoryClient, transcript: &[ChatMessage]) -> Result<usize> {
        let messages = self.filter_transcript(transcript);
        if messages.is_empty() {
            debug!(user_id = %self.user_id, "Nothing to store");
            return Ok(0);
        }

        client.add(&messages, &self.user_id).await?;
        info!(user_id = %self.user_id, count = messages.len(), "Conversation saved to memory");
        Ok(messages.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(text: &str) -> MemoryEntry {
        MemoryEntry {
            memory: text.to_string(),
            updated_at: Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_load_builds_opening_message() {
        let client = InMemoryClient::new();
        client.seed("alice", vec![entry("Prefers metric units")]);

        let ctx = MemoryContext::load(&client, "alice").await.unwrap();
        let json = ctx.memory_json().unwrap();
        assert_eq!(
            json,
            r#"[{"memory":"Prefers metric units","updated_at":"2025-03-14T09:26:53Z"}]"#
        );

        let opening = ctx.opening_message().unwrap();
        assert_eq!(opening.role, "assistant");
        assert_eq!(
            opening.content,
            format!(
                "The following is a list of memories from previous conversations with the user alice: {}",
                json
            )
        );
    }

    #[tokio::test]
    async fn test_load_without_memories() {
        let client = InMemoryClient::new();
        let ctx = MemoryContext::load(&client, "bob").await.unwrap();
        assert!(ctx.opening_message().is_none());
        assert!(ctx.memory_json().is_none());
        assert_eq!(ctx.user_id(), "bob");
    }

    #[tokio::test]
    async fn test_persist_filters_transcript() {
        let client = InMemoryClient::new();
        client.seed("alice", vec![entry("Lives in Lyon")]);
        let ctx = MemoryContext::load(&client, "alice").await.unwrap();

        let mut transcript = vec![ctx.opening_message().unwrap().clone()];
        transcript.push(ChatMessage::new("system", "You are a helpful butler"));
        transcript.push(ChatMessage::user("  What's the weather?  "));
        transcript.push(ChatMessage::new("tool", "{\"temperature\": 12}"));
        transcript.push(ChatMessage::assistant("It is 12 degrees in Lyon.\n"));

        let stored = ctx.persist(&client, &transcript).await.unwrap();
        assert_eq!(stored, 2);
        assert_eq!(
            client.added("alice"),
            vec![
                ChatMessage::user("What's the weather?"),
                ChatMessage::assistant("It is 12 degrees in Lyon."),
            ]
        );
    }

    #[tokio::test]
    async fn test_persist_skips_empty_transcript() {
        let client = InMemoryClient::new();
        let ctx = MemoryContext::load(&client, "carol").await.unwrap();
        let stored = ctx
            .persist(&client, &[ChatMessage::new("system", "boot")])
            .await
            .unwrap();
        assert_eq!(stored, 0);
        assert_eq!(client.add_calls(), 0);
    }

    #[test]
    fn test_from_config_in_memory() {
        assert!(from_config(&MemoryConfig::default()).is_ok());
    }
}
