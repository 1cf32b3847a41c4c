//! Tool system for the assistant
//!
//! This module holds the named tools a conversational agent can call, and the
//! guarded execution layer every call passes through. Key features:
//! - Registry of available tools with a runtime-mutable enabled subset
//! - Per-resource serialization of desktop operations
//! - Per-tool minimum intervals between invocations
//! - Capability gating with fixed unavailable messages
//! - Error, panic, timeout and cancellation containment
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use valet_core::platform::Platform;
//! use valet_core::tools::{ToolContext, ToolEnvironment, ToolRegistry, ToolRuntime, ToolRuntimeConfig};
//!
//! # async fn example() -> valet_core::error::Result<()> {
//! let env = Arc::new(ToolEnvironment::new(Platform::system()));
//! let registry = ToolRegistry::builtin(env.clone(), None)?;
//! let runtime = ToolRuntime::new(ToolRuntimeConfig::default())
//!     .with_capabilities(env.capabilities().clone());
//!
//! let outcome = runtime
//!     .dispatch(&registry, "set_volume", serde_json::json!({"level": 40}), &ToolContext::new())
//!     .await;
//! println!("{}", outcome.reply);
//! # Ok(())
//! # }
//! ```

mod binding;
pub mod builtin;
mod capability;
mod environment;
mod guard;
mod registry;
mod result;
mod retry;
mod runtime;
mod throttle;
mod tool;

pub use binding::BindingScope;
pub use capability::{Capability, CapabilitySet};
pub use environment::ToolEnvironment;
pub use guard::{LeaseHold, ResourceClass, ResourceGuards, ResourceLease};
pub use registry::{RegistryError, ToolRegistry};
pub use result::{
    InvocationOutcome, InvocationRecord, ToolCallOutcome, ToolError, ToolErrorKind, ToolReply,
};
pub use retry::{RetryConfig, RetryState, with_retry};
pub use runtime::{ToolContext, ToolRuntime, ToolRuntimeConfig};
pub use throttle::Throttle;
pub use tool::{
    BoxedTool, Tool, ToolDefinition, ToolExecutionContext, ToolMetadata, ToolSchema, parse_args,
};

#[cfg(test)]
mod tests;
