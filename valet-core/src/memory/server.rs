//! HTTP client for a hosted memory service
//!
//! Speaks the mem0-style REST API:
//! - `GET  {url}/v1/memories/?user_id=…` lists a user's memories
//! - `POST {url}/v1/memories/` with `{messages, user_id}` adds a conversation
//!
//! Requests carry `Authorization: Token <key>` when a key is configured.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{ChatMessage, MemoryClient, MemoryEntry};
use crate::error::{Result, ValetError};

#[derive(Debug, Deserialize)]
struct RawMemory {
    memory: String,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

/// The list endpoint answers either a bare array or `{"results": [...]}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Bare(Vec<RawMemory>),
    Wrapped { results: Vec<RawMemory> },
}

impl ListResponse {
    fn into_entries(self) -> Vec<MemoryEntry> {
        let raw = match self {
            ListResponse::Bare(raw) => raw,
            ListResponse::Wrapped { results } => results,
        };
        raw.into_iter()
            .map(|m| MemoryEntry {
                updated_at: m
                    .updated_at
                    .or(m.created_at)
                    .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
                memory: m.memory,
            })
            .collect()
    }
}

/// Memory client backed by a remote service
pub struct ServerMemoryClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl ServerMemoryClient {
    /// Create a client for the service at `base_url`
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            ValetError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn memories_url(&self) -> String {
        format!("{}/v1/memories/", self.base_url)
    }

    fn add_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(reqwest::header::AUTHORIZATION, format!("Token {}", key)),
            None => request,
        }
    }

    async fn check(response: reqwest::Response, action: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(ValetError::Memory(format!(
            "{} failed with status {}: {}",
            action, status, body
        )))
    }
}

#[async_trait]
impl MemoryClient for ServerMemoryClient {
    async fn get_all(&self, user_id: &str) -> Result<Vec<MemoryEntry>> {
        let request = self.add_auth(
            self.client
                .get(self.memories_url())
                .query(&[("user_id", user_id)]),
        );
        let response = request
            .send()
            .await
            .map_err(|e| ValetError::Memory(format!("Failed to list memories: {}", e)))?;
        let response = Self::check(response, "List memories").await?;

        let list: ListResponse = response
            .json()
            .await
            .map_err(|e| ValetError::Memory(format!("Failed to parse memories: {}", e)))?;
        let entries = list.into_entries();
        debug!(user_id, count = entries.len(), "Fetched memories");
        Ok(entries)
    }

    async fn add(&self, messages: &[ChatMessage], user_id: &str) -> Result<()> {
        let body = json!({
            "messages": messages,
            "user_id": user_id,
        });
        let request = self.add_auth(self.client.post(self.memories_url()).json(&body));
        let response = request
            .send()
            .await
            .map_err(|e| ValetError::Memory(format!("Failed to add memories: {}", e)))?;
        Self::check(response, "Add memories").await?;
        Ok(())
    }
}
