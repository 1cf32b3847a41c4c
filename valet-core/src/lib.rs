//! # Valet - tools for a voice-driven desktop assistant
//!
//! Valet is the tool layer behind a conversational voice assistant. The
//! language model decides which tool to call; Valet makes sure the call is
//! safe to run on a live desktop:
//! - A fixed registry of named tools with a runtime-mutable enabled set
//! - Per-resource serialization (audio, brightness, display, screenshot, windows)
//! - Per-tool minimum intervals between invocations
//! - Capability probing with fixed "not available" replies
//! - Error, panic, timeout and cancellation containment at the tool boundary
//! - A long-term memory collaborator for per-user context
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use valet_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ValetConfig::load()?;
//!     let session = AssistantSession::start(config, Platform::system()).await?;
//!
//!     let outcome = session
//!         .call_tool("set_volume", serde_json::json!({"level": 40}))
//!         .await;
//!     println!("{}", outcome.reply);
//!
//!     session.shutdown(&[]).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod memory;
pub mod observability;
pub mod platform;
pub mod session;
pub mod tools;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{LoggingConfig, MemoryConfig, MemoryMode, ToolsConfig, ValetConfig};
    pub use crate::error::{Result, ValetError};
    pub use crate::memory::{ChatMessage, MemoryClient, MemoryContext, MemoryEntry};
    pub use crate::platform::{Platform, PlatformError, SimulatedPlatform};
    pub use crate::session::AssistantSession;
    pub use crate::tools::{
        Capability, CapabilitySet, InvocationOutcome, ResourceClass, Tool, ToolCallOutcome,
        ToolContext, ToolDefinition, ToolEnvironment, ToolError, ToolErrorKind, ToolMetadata,
        ToolRegistry, ToolReply, ToolRuntime, ToolRuntimeConfig, ToolSchema,
    };
}
