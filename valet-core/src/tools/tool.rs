//! Tool trait and metadata definitions
//!
//! A tool is a named async operation the agent can call with JSON arguments.
//! Its metadata declares everything the runtime needs to wrap it: the
//! resource class it serializes on, the capability it needs, its fixed
//! unavailability message, and its minimum call interval.

use super::capability::Capability;
use super::guard::ResourceClass;
use super::result::{ToolError, ToolReply};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Tool metadata for LLM-friendly discovery and runtime policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    /// Tool name (unique identifier)
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// What the tool returns
    pub returns: String,

    /// Tags for categorization
    pub tags: Vec<String>,

    /// Resource class the tool body serializes on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceClass>,

    /// Platform capability the tool needs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<Capability>,

    /// Reply used when the capability is missing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unavailable_message: Option<String>,

    /// Minimum spacing between call starts
    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub min_interval: Option<Duration>,
}

impl ToolMetadata {
    /// Create new metadata with required fields
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            returns: "A short status sentence".to_string(),
            tags: Vec::new(),
            resource: None,
            capability: None,
            unavailable_message: None,
            min_interval: None,
        }
    }

    /// Set return description
    pub fn with_returns(mut self, returns: impl Into<String>) -> Self {
        self.returns = returns.into();
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Serialize the tool body on a resource class
    pub fn with_resource(mut self, resource: ResourceClass) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Require a platform capability, answering `message` when it is missing
    pub fn with_capability(mut self, capability: Capability, message: impl Into<String>) -> Self {
        self.capability = Some(capability);
        self.unavailable_message = Some(message.into());
        self
    }

    /// Enforce a minimum interval between call starts
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = Some(interval);
        self
    }
}

/// JSON Schema for tool parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// JSON Schema for input parameters
    pub parameters: Value,
}

impl ToolSchema {
    /// Create a schema from a JSON Schema value
    pub fn new(parameters: Value) -> Self {
        Self { parameters }
    }

    /// Create an empty schema (tool takes no parameters)
    pub fn empty() -> Self {
        Self {
            parameters: serde_json::json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        }
    }

    /// Schema with a single required property
    pub fn single(name: &str, kind: &str, description: &str) -> Self {
        Self::new(serde_json::json!({
            "type": "object",
            "properties": {
                name: { "type": kind, "description": description }
            },
            "required": [name]
        }))
    }
}

/// Function definition handed to the language model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// JSON Schema for input parameters
    pub parameters: Value,
}

/// Context provided to tool execution
#[derive(Debug, Clone)]
pub struct ToolExecutionContext {
    /// Invocation id assigned by the runtime
    pub invocation_id: uuid::Uuid,

    /// Trace ID for correlation
    pub trace_id: Option<String>,
}

impl Default for ToolExecutionContext {
    fn default() -> Self {
        Self {
            invocation_id: uuid::Uuid::new_v4(),
            trace_id: None,
        }
    }
}

impl ToolExecutionContext {
    /// Create a new context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set trace ID
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }
}

/// Core tool trait
///
/// The runtime applies rate limiting, the capability check, the timeout and
/// error containment before and around `invoke`. Tool bodies acquire their
/// own resource guard.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get tool metadata
    fn metadata(&self) -> &ToolMetadata;

    /// Get tool name (convenience method)
    fn name(&self) -> &str {
        &self.metadata().name
    }

    /// Get tool description (convenience method)
    fn description(&self) -> &str {
        &self.metadata().description
    }

    /// Get the JSON schema for this tool's parameters
    fn schema(&self) -> ToolSchema;

    /// Definition handed to the language model
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.schema().parameters,
        }
    }

    /// Run the tool body
    async fn invoke(
        &self,
        args: Value,
        ctx: &ToolExecutionContext,
    ) -> Result<ToolReply, ToolError>;
}

/// Type alias for shared tools
pub type BoxedTool = Arc<dyn Tool>;

/// Deserialize tool arguments, treating `null` as an empty object
pub fn parse_args<T: DeserializeOwned>(tool_name: &str, args: Value) -> Result<T, ToolError> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args)
        .map_err(|e| ToolError::validation(format!("Invalid arguments for {}: {}", tool_name, e)))
}
