//! Tool replies, invocation records and the error taxonomy
//!
//! A tool body returns `Result<ToolReply, ToolError>`. The runtime turns every
//! outcome (including panics, timeouts and cancellation) into a [`ToolReply`]
//! and keeps an [`InvocationRecord`] for logging and inspection.

use crate::platform::PlatformError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// What a tool hands back to the conversational agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolReply {
    /// Short human-readable sentence
    Text(String),

    /// Structured record (weather data, error records)
    Record(Value),
}

impl ToolReply {
    /// Create a text reply
    pub fn text(text: impl Into<String>) -> Self {
        ToolReply::Text(text.into())
    }

    /// Get the text if this is a text reply
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ToolReply::Text(text) => Some(text),
            ToolReply::Record(_) => None,
        }
    }

    /// Get the record if this is a structured reply
    pub fn as_record(&self) -> Option<&Value> {
        match self {
            ToolReply::Record(value) => Some(value),
            ToolReply::Text(_) => None,
        }
    }

    /// Convert to a JSON value for transport
    pub fn into_value(self) -> Value {
        match self {
            ToolReply::Text(text) => Value::String(text),
            ToolReply::Record(value) => value,
        }
    }
}

impl fmt::Display for ToolReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolReply::Text(text) => f.write_str(text),
            ToolReply::Record(value) => write!(f, "{}", value),
        }
    }
}

impl From<String> for ToolReply {
    fn from(text: String) -> Self {
        ToolReply::Text(text)
    }
}

impl From<&str> for ToolReply {
    fn from(text: &str) -> Self {
        ToolReply::Text(text.to_string())
    }
}

/// Structured tool error with taxonomy
///
/// `message` is the complete sentence shown to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    /// Error kind (determines retryability)
    pub kind: ToolErrorKind,

    /// Human-readable error message
    pub message: String,
}

impl ToolError {
    /// Create a new tool error
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Subsystem missing on this machine
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Unavailable, message)
    }

    /// Failure that may succeed on retry
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Transient, message)
    }

    /// The requested object does not exist
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::NotFound, message)
    }

    /// Arguments failed to parse or validate
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Validation, message)
    }

    /// Create a timeout error
    pub fn timeout(tool_name: &str, duration: Duration) -> Self {
        Self::new(
            ToolErrorKind::Timeout,
            format!("Error in {}: timed out after {:?}", tool_name, duration),
        )
    }

    /// Create a cancellation error
    pub fn cancelled(tool_name: &str) -> Self {
        Self::new(
            ToolErrorKind::Cancelled,
            format!("Error in {}: cancelled", tool_name),
        )
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Internal, message)
    }

    /// Prefix the message with a tool-specific failure phrase, keeping the kind
    pub fn context(self, prefix: &str) -> Self {
        Self {
            kind: self.kind,
            message: format!("{}: {}", prefix, self.message),
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)
    }
}

impl std::error::Error for ToolError {}

impl From<PlatformError> for ToolError {
    fn from(err: PlatformError) -> Self {
        let kind = match &err {
            PlatformError::Unavailable(_) => ToolErrorKind::Unavailable,
            PlatformError::Transient(_) | PlatformError::CommandFailed { .. } => {
                ToolErrorKind::Transient
            }
            PlatformError::NotFound(_) => ToolErrorKind::NotFound,
            PlatformError::Parse(_) | PlatformError::Io(_) => ToolErrorKind::Internal,
        };
        Self::new(kind, err.to_string())
    }
}

/// Error kind taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// Required subsystem is missing (fixed message, never retried)
    Unavailable,

    /// Subsystem hiccup (retried where the tool has a retry policy)
    Transient,

    /// Target does not exist (user error, reported immediately)
    NotFound,

    /// Input validation failed (not retryable - fix args)
    Validation,

    /// Execution timed out
    Timeout,

    /// Cancelled by user/system (not retryable)
    Cancelled,

    /// Internal tool error (not retryable - bug)
    Internal,
}

impl ToolErrorKind {
    /// Check if this error kind is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, ToolErrorKind::Transient | ToolErrorKind::Timeout)
    }

    /// Check if this error kind is fatal (never retry)
    pub fn is_fatal(&self) -> bool {
        !self.is_retryable()
    }
}

/// How an invocation ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InvocationOutcome {
    /// The tool body returned a reply
    Success,

    /// The tool body returned an error
    Failed {
        /// Error kind
        kind: ToolErrorKind,
    },

    /// The tool body panicked
    Panicked,

    /// The call exceeded its timeout
    TimedOut,

    /// The call was cancelled
    Cancelled,

    /// The required capability was not detected
    Unavailable,
}

impl InvocationOutcome {
    /// Check if the invocation succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, InvocationOutcome::Success)
    }
}

/// Metadata kept for every invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRecord {
    /// Tool name
    pub tool_name: String,

    /// Unique id for log correlation
    pub invocation_id: uuid::Uuid,

    /// Short hash of the serialized arguments
    pub args_hash: String,

    /// Timestamp when execution started
    pub started_at: DateTime<Utc>,

    /// Execution duration, throttle wait included
    #[serde(with = "duration_millis")]
    pub duration: Duration,

    /// How the call ended
    pub outcome: InvocationOutcome,
}

impl InvocationRecord {
    /// Create a new record
    pub fn new(tool_name: impl Into<String>, args_hash: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            invocation_id: uuid::Uuid::new_v4(),
            args_hash: args_hash.into(),
            started_at: Utc::now(),
            duration: Duration::ZERO,
            outcome: InvocationOutcome::Success,
        }
    }

    /// Set duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set outcome
    pub fn with_outcome(mut self, outcome: InvocationOutcome) -> Self {
        self.outcome = outcome;
        self
    }
}

/// Reply plus the record of how it was produced
#[derive(Debug, Clone)]
pub struct ToolCallOutcome {
    /// What the agent sees
    pub reply: ToolReply,

    /// What the logs see
    pub record: InvocationRecord,
}

// Serde helpers for Duration serialization as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
