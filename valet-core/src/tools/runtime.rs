//! Tool runtime with uniform execution policies
//!
//! Every invocation goes through the same layers, outermost first:
//! - error containment (errors, panics, timeouts and cancellation all become
//!   a reply; nothing propagates)
//! - rate limiting (per-tool minimum interval, callers are delayed)
//! - capability check (missing capability answers the tool's fixed message)
//! - timeout and cancellation around the tool body

use super::capability::CapabilitySet;
use super::registry::ToolRegistry;
use super::result::{
    InvocationOutcome, InvocationRecord, ToolCallOutcome, ToolError, ToolErrorKind, ToolReply,
};
use super::throttle::Throttle;
use super::tool::{Tool, ToolExecutionContext, ToolMetadata};
use crate::config::ToolsConfig;
use futures::FutureExt;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Context for tool execution (passed through runtime)
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Trace ID for correlation
    pub trace_id: Option<String>,

    /// Cancellation token
    pub cancellation: Option<CancellationToken>,
}

impl ToolContext {
    /// Create a new context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set trace ID
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Set cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Check if cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map(|t| t.is_cancelled())
            .unwrap_or(false)
    }
}

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct ToolRuntimeConfig {
    /// Default timeout for tool execution
    pub default_timeout: Duration,

    /// Per-tool timeout overrides
    pub tool_timeouts: HashMap<String, Duration>,

    /// Per-tool minimum interval overrides (zero disables the limit)
    pub rate_limits: HashMap<String, Duration>,
}

impl Default for ToolRuntimeConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            tool_timeouts: HashMap::new(),
            rate_limits: HashMap::new(),
        }
    }
}

impl ToolRuntimeConfig {
    /// Create a config with a specific timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Add a tool-specific timeout
    pub fn with_tool_timeout(mut self, tool_name: impl Into<String>, timeout: Duration) -> Self {
        self.tool_timeouts.insert(tool_name.into(), timeout);
        self
    }

    /// Override a tool's minimum interval
    pub fn with_rate_limit(mut self, tool_name: impl Into<String>, interval: Duration) -> Self {
        self.rate_limits.insert(tool_name.into(), interval);
        self
    }
}

impl From<&ToolsConfig> for ToolRuntimeConfig {
    fn from(config: &ToolsConfig) -> Self {
        Self {
            default_timeout: config.default_timeout,
            tool_timeouts: config
                .tool_timeouts
                .iter()
                .map(|(name, d)| (name.clone(), **d))
                .collect(),
            rate_limits: config
                .rate_limits
                .iter()
                .map(|(name, d)| (name.clone(), **d))
                .collect(),
        }
    }
}

enum Completion {
    Reply(ToolReply),
    Failed(ToolError),
    Panicked(String),
    TimedOut(Duration),
    Cancelled,
    Unavailable(String),
}

/// Tool runtime with safety enforcement
#[derive(Debug)]
pub struct ToolRuntime {
    config: ToolRuntimeConfig,
    capabilities: CapabilitySet,
    throttle: Throttle,
}

impl ToolRuntime {
    /// Create a runtime that assumes every capability is present
    pub fn new(config: ToolRuntimeConfig) -> Self {
        Self {
            config,
            capabilities: CapabilitySet::all(),
            throttle: Throttle::new(),
        }
    }

    /// Builder: set detected capabilities
    pub fn with_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Get the runtime config
    pub fn config(&self) -> &ToolRuntimeConfig {
        &self.config
    }

    /// Get the rate-limit table
    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    /// Get timeout for a specific tool
    fn get_timeout(&self, tool_name: &str) -> Duration {
        self.config
            .tool_timeouts
            .get(tool_name)
            .copied()
            .unwrap_or(self.config.default_timeout)
    }

    /// Effective minimum interval for a tool
    fn get_interval(&self, metadata: &ToolMetadata) -> Option<Duration> {
        self.config
            .rate_limits
            .get(&metadata.name)
            .copied()
            .or(metadata.min_interval)
            .filter(|interval| !interval.is_zero())
    }

    /// Execute a tool with every policy applied. Never fails.
    pub async fn execute(&self, tool: &dyn Tool, args: Value, ctx: &ToolContext) -> ToolCallOutcome {
        let started = Instant::now();
        let metadata = tool.metadata();
        let tool_name = metadata.name.as_str();

        let record = InvocationRecord::new(tool_name, hash_args(&args));
        let exec_ctx = ToolExecutionContext {
            invocation_id: record.invocation_id,
            trace_id: ctx.trace_id.clone(),
        };

        debug!(
            tool = tool_name,
            invocation_id = %record.invocation_id,
            args = %args,
            "Executing tool"
        );

        let guarded = async {
            if let Some(interval) = self.get_interval(metadata) {
                self.throttle.pace(tool_name, interval).await;
            }

            if let Some(capability) = metadata.capability {
                if !self.capabilities.contains(capability) {
                    let message = metadata.unavailable_message.clone().unwrap_or_else(|| {
                        format!("{} is not available on this system", tool_name)
                    });
                    return Completion::Unavailable(message);
                }
            }

            let tool_timeout = self.get_timeout(tool_name);
            let body = AssertUnwindSafe(tool.invoke(args, &exec_ctx)).catch_unwind();
            match timeout(tool_timeout, body).await {
                Ok(Ok(Ok(reply))) => Completion::Reply(reply),
                Ok(Ok(Err(error))) => Completion::Failed(error),
                Ok(Err(payload)) => Completion::Panicked(panic_message(payload)),
                Err(_) => Completion::TimedOut(tool_timeout),
            }
        };

        let completion = if ctx.is_cancelled() {
            Completion::Cancelled
        } else if let Some(ref cancel_token) = ctx.cancellation {
            tokio::select! {
                _ = cancel_token.cancelled() => Completion::Cancelled,
                completion = guarded => completion,
            }
        } else {
            guarded.await
        };

        let duration = started.elapsed();
        let duration_ms = duration.as_millis() as u64;
        let invocation_id = record.invocation_id;

        let (reply, outcome) = match completion {
            Completion::Reply(reply) => {
                info!(tool = tool_name, %invocation_id, duration_ms, "Tool completed");
                (reply, InvocationOutcome::Success)
            }
            Completion::Failed(error) => {
                if error.kind == ToolErrorKind::Internal {
                    error!(tool = tool_name, %invocation_id, duration_ms, error = ?error, "Tool failed");
                } else {
                    error!(tool = tool_name, %invocation_id, duration_ms, kind = ?error.kind, error = %error.message, "Tool failed");
                }
                let kind = error.kind;
                (ToolReply::Text(error.message), InvocationOutcome::Failed { kind })
            }
            Completion::Panicked(message) => {
                error!(tool = tool_name, %invocation_id, duration_ms, panic = %message, "Tool panicked");
                (
                    ToolReply::Text(format!("Error in {}: {}", tool_name, message)),
                    InvocationOutcome::Panicked,
                )
            }
            Completion::TimedOut(limit) => {
                error!(tool = tool_name, %invocation_id, timeout_ms = limit.as_millis() as u64, "Tool timed out");
                (
                    ToolReply::Text(ToolError::timeout(tool_name, limit).message),
                    InvocationOutcome::TimedOut,
                )
            }
            Completion::Cancelled => {
                warn!(tool = tool_name, %invocation_id, duration_ms, "Tool cancelled");
                (
                    ToolReply::Text(ToolError::cancelled(tool_name).message),
                    InvocationOutcome::Cancelled,
                )
            }
            Completion::Unavailable(message) => {
                warn!(tool = tool_name, %invocation_id, "Required capability not detected");
                (ToolReply::Text(message), InvocationOutcome::Unavailable)
            }
        };

        ToolCallOutcome {
            reply,
            record: record.with_duration(duration).with_outcome(outcome),
        }
    }

    /// Execute a tool and return just the reply
    pub async fn invoke(&self, tool: &dyn Tool, args: Value, ctx: &ToolContext) -> ToolReply {
        self.execute(tool, args, ctx).await.reply
    }

    /// Look up an enabled tool by name and execute it
    pub async fn dispatch(
        &self,
        registry: &ToolRegistry,
        name: &str,
        args: Value,
        ctx: &ToolContext,
    ) -> ToolCallOutcome {
        let tool = registry.get_active(name).map(|tool| tool.as_ref());
        self.execute_resolved(name, tool, args, ctx).await
    }

    /// Execute a tool already looked up under `name`, answering
    /// "not available" when the lookup found nothing
    pub async fn execute_resolved(
        &self,
        name: &str,
        tool: Option<&dyn Tool>,
        args: Value,
        ctx: &ToolContext,
    ) -> ToolCallOutcome {
        match tool {
            Some(tool) => self.execute(tool, args, ctx).await,
            None => {
                warn!(tool = name, "Call to inactive or unknown tool");
                ToolCallOutcome {
                    reply: ToolReply::Text(format!("Tool '{}' is not available", name)),
                    record: InvocationRecord::new(name, hash_args(&args))
                        .with_outcome(InvocationOutcome::Unavailable),
                }
            }
        }
    }
}

/// Short hash of the serialized arguments for log correlation
pub(crate) fn hash_args(args: &Value) -> String {
    let args_json = serde_json::to_string(args).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(args_json.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
