//! Process-local memory client
//!
//! Keeps memories in a map keyed by user. Every added message becomes a
//! memory verbatim; nothing is summarized or deduplicated.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use super::{ChatMessage, MemoryClient, MemoryEntry};
use crate::error::Result;

#[derive(Debug, Default)]
struct UserMemories {
    entries: Vec<MemoryEntry>,
    added: Vec<ChatMessage>,
}

/// In-memory client for tests and offline use
#[derive(Debug, Default)]
pub struct InMemoryClient {
    users: RwLock<HashMap<String, UserMemories>>,
    add_calls: AtomicUsize,
}

impl InMemoryClient {
    /// Create an empty client
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, UserMemories>> {
        self.users.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, UserMemories>> {
        self.users.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Preload memories for a user
    pub fn seed(&self, user_id: &str, entries: Vec<MemoryEntry>) {
        self.write()
            .entry(user_id.to_string())
            .or_default()
            .entries
            .extend(entries);
    }

    /// Messages handed to `add` for a user, in order
    pub fn added(&self, user_id: &str) -> Vec<ChatMessage> {
        self.read()
            .get(user_id)
            .map(|u| u.added.clone())
            .unwrap_or_default()
    }

    /// Number of `add` calls across all users
    pub fn add_calls(&self) -> usize {
        self.add_calls.load(Ordering::SeqCst)
    }

    /// Drop everything
    pub fn clear(&self) {
        self.write().clear();
        self.add_calls.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl MemoryClient for InMemoryClient {
    async fn get_all(&self, user_id: &str) -> Result<Vec<MemoryEntry>> {
        Ok(self
            .read()
            .get(user_id)
            .map(|u| u.entries.clone())
            .unwrap_or_default())
    }

    async fn add(&self, messages: &[ChatMessage], user_id: &str) -> Result<()> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();

        let mut users = self.write();
        let user = users.entry(user_id.to_string()).or_default();
        user.added.extend_from_slice(messages);
        user.entries.extend(messages.iter().map(|m| MemoryEntry {
            memory: m.content.clone(),
            updated_at: now,
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_then_get_all() {
        let client = InMemoryClient::new();
        client
            .add(&[ChatMessage::user("I have a cat named Miso")], "dana")
            .await
            .unwrap();

        let entries = client.get_all("dana").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].memory, "I have a cat named Miso");
        assert!(client.get_all("erin").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear() {
        let client = InMemoryClient::new();
        client.add(&[ChatMessage::user("hi")], "dana").await.unwrap();
        client.clear();
        assert!(client.get_all("dana").await.unwrap().is_empty());
        assert_eq!(client.add_calls(), 0);
    }
}
