//! Assistant session: the one place process-wide tool state lives
//!
//! A session is built once at startup and handed to the conversational
//! agent driver. It owns the tool environment (resource guards, platform,
//! probed capabilities), the registry, the runtime, and the memory
//! collaborator.

use crate::config::ValetConfig;
use crate::error::Result;
use crate::memory::{self, ChatMessage, MemoryClient, MemoryContext};
use crate::platform::Platform;
use crate::tools::{
    ToolCallOutcome, ToolContext, ToolDefinition, ToolEnvironment, ToolRegistry, ToolReply,
    ToolRuntime, ToolRuntimeConfig,
};
use serde_json::Value;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

/// Tool that reports subsystem status
const HEALTH_TOOL: &str = "display_health";

/// A running assistant session
pub struct AssistantSession {
    config: ValetConfig,
    env: Arc<ToolEnvironment>,
    registry: RwLock<ToolRegistry>,
    runtime: ToolRuntime,
    memory: Arc<dyn MemoryClient>,
    memory_context: MemoryContext,
}

impl AssistantSession {
    /// Start a session using the memory backend named in `config`
    pub async fn start(config: ValetConfig, platform: Platform) -> Result<Self> {
        let memory = memory::from_config(&config.memory)?;
        Self::start_with_memory(config, platform, memory).await
    }

    /// Start a session with an explicit memory client.
    ///
    /// A memory service that cannot be reached is logged and the session
    /// starts without prior memories.
    pub async fn start_with_memory(
        config: ValetConfig,
        platform: Platform,
        memory: Arc<dyn MemoryClient>,
    ) -> Result<Self> {
        config.validate()?;

        let env = Arc::new(ToolEnvironment::from_config(platform, &config)?);
        let registry = ToolRegistry::builtin(env.clone(), config.tools.enabled.as_deref())?;
        let runtime = ToolRuntime::new(ToolRuntimeConfig::from(&config.tools))
            .with_capabilities(env.capabilities().clone());

        let user_id = config.assistant.user_id.clone();
        let memory_context = match MemoryContext::load(memory.as_ref(), &user_id).await {
            Ok(context) => context,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Could not load memories, starting fresh");
                MemoryContext::empty(&user_id)
            }
        };

        info!(
            user_id = %user_id,
            enabled = ?registry.enabled_names(),
            "Assistant session started"
        );

        Ok(Self {
            config,
            env,
            registry: RwLock::new(registry),
            runtime,
            memory,
            memory_context,
        })
    }

    fn registry(&self) -> RwLockReadGuard<'_, ToolRegistry> {
        self.registry
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn registry_mut(&self) -> RwLockWriteGuard<'_, ToolRegistry> {
        self.registry
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Session configuration
    pub fn config(&self) -> &ValetConfig {
        &self.config
    }

    /// Shared tool environment
    pub fn environment(&self) -> &Arc<ToolEnvironment> {
        &self.env
    }

    /// Memories loaded at start
    pub fn memory_context(&self) -> &MemoryContext {
        &self.memory_context
    }

    /// Message that seeds the conversation with stored memories
    pub fn opening_message(&self) -> Option<&ChatMessage> {
        self.memory_context.opening_message()
    }

    /// Definitions of the enabled tools, in name order
    pub fn active_tools(&self) -> Vec<ToolDefinition> {
        self.registry().active_definitions()
    }

    /// Every available tool with whether it is enabled, in name order
    pub fn tool_menu(&self) -> Vec<(ToolDefinition, bool)> {
        let registry = self.registry();
        registry
            .all()
            .into_iter()
            .map(|tool| {
                let enabled = registry.is_enabled(tool.name());
                (tool.definition(), enabled)
            })
            .collect()
    }

    /// Enable a tool by name; returns whether the enabled set changed
    pub fn enable_tool(&self, name: &str) -> bool {
        self.registry_mut().enable_tool(name)
    }

    /// Disable a tool by name; returns whether the enabled set changed
    pub fn disable_tool(&self, name: &str) -> bool {
        self.registry_mut().disable_tool(name)
    }

    /// Invoke an enabled tool
    pub async fn call_tool(&self, name: &str, args: Value) -> ToolCallOutcome {
        self.call_tool_with(name, args, &ToolContext::new()).await
    }

    /// Invoke an enabled tool with an explicit context
    pub async fn call_tool_with(&self, name: &str, args: Value, ctx: &ToolContext) -> ToolCallOutcome {
        let tool = self.registry().get_active(name).cloned();
        self.runtime
            .execute_resolved(name, tool.as_deref(), args, ctx)
            .await
    }

    /// Subsystem status report, whether or not the health tool is enabled
    pub async fn health_report(&self) -> ToolReply {
        let tool = self.registry().get(HEALTH_TOOL).cloned();
        match tool {
            Some(tool) => {
                self.runtime
                    .invoke(tool.as_ref(), Value::Null, &ToolContext::new())
                    .await
            }
            None => ToolReply::Text(format!("Tool '{}' is not available", HEALTH_TOOL)),
        }
    }

    /// End the session, storing the conversation.
    ///
    /// Returns the number of messages stored.
    pub async fn shutdown(self, transcript: &[ChatMessage]) -> Result<usize> {
        info!(user_id = %self.config.assistant.user_id, "Shutting down, saving conversation to memory");
        self.memory_context
            .persist(self.memory.as_ref(), transcript)
            .await
    }
}
