//! Tool Registry: the fixed tool menu and its mutable enabled set
//!
//! The set of available tools is fixed when the registry is built; duplicate
//! names are a construction error. Only the enabled subset changes at
//! runtime, and it always stays a subset of the available names.
//!
//! Enabling or disabling an unknown name is ignored with a warning; use
//! [`ToolRegistry::is_available`] to tell unknown names apart.
//!
//! # Example
//!
//! ```rust,ignore
//! use valet_core::tools::{ToolEnvironment, ToolRegistry};
//!
//! let env = Arc::new(ToolEnvironment::new(Platform::system()));
//! let mut registry = ToolRegistry::builtin(env, None)?;
//!
//! registry.enable_tool("unmute_audio");
//! let definitions = registry.active_definitions();
//! ```

use super::builtin;
use super::environment::ToolEnvironment;
use super::tool::{Tool, ToolDefinition};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Two tools share a name
    DuplicateTool(String),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::DuplicateTool(name) => {
                write!(f, "Tool '{}' is already registered", name)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Registry of available tools and the enabled subset
pub struct ToolRegistry {
    available: BTreeMap<String, Arc<dyn Tool>>,
    enabled: BTreeSet<String>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("available", &self.available.keys().collect::<Vec<_>>())
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl ToolRegistry {
    /// Build a registry from a fixed tool list and the names to enable.
    ///
    /// Unknown names in `enabled` are ignored with a warning.
    pub fn new<I, S>(tools: Vec<Arc<dyn Tool>>, enabled: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut available = BTreeMap::new();
        for tool in tools {
            let name = tool.name().to_string();
            if available.contains_key(&name) {
                return Err(RegistryError::DuplicateTool(name));
            }
            available.insert(name, tool);
        }

        let mut registry = Self {
            available,
            enabled: BTreeSet::new(),
        };
        for name in enabled {
            registry.enable_tool(name.as_ref());
        }
        Ok(registry)
    }

    /// Build the standard tool menu.
    ///
    /// `enabled` replaces the default enabled set when given.
    pub fn builtin(
        env: Arc<ToolEnvironment>,
        enabled: Option<&[String]>,
    ) -> Result<Self, RegistryError> {
        let tools = builtin::all_tools(&env);
        match enabled {
            Some(names) => Self::new(tools, names),
            None => Self::new(tools, builtin::DEFAULT_ENABLED.iter().copied()),
        }
    }

    /// Get an available tool by name, enabled or not
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.available.get(name)
    }

    /// Get a tool by name only if it is enabled
    pub fn get_active(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        if self.enabled.contains(name) {
            self.available.get(name)
        } else {
            None
        }
    }

    /// Enabled tools in ascending name order
    pub fn get_active_tools(&self) -> Vec<Arc<dyn Tool>> {
        self.enabled
            .iter()
            .filter_map(|name| self.available.get(name).cloned())
            .collect()
    }

    /// Function definitions of the enabled tools, for the language model
    pub fn active_definitions(&self) -> Vec<ToolDefinition> {
        self.get_active_tools()
            .iter()
            .map(|tool| tool.definition())
            .collect()
    }

    /// Every available tool in ascending name order
    pub fn all(&self) -> Vec<Arc<dyn Tool>> {
        self.available.values().cloned().collect()
    }

    /// Enable a tool. Returns whether the enabled set changed.
    pub fn enable_tool(&mut self, name: &str) -> bool {
        if !self.available.contains_key(name) {
            warn!(tool = name, "Ignoring request to enable unknown tool");
            return false;
        }
        let changed = self.enabled.insert(name.to_string());
        if changed {
            debug!(tool = name, "Tool enabled");
        }
        changed
    }

    /// Disable a tool. Returns whether the enabled set changed.
    pub fn disable_tool(&mut self, name: &str) -> bool {
        if !self.available.contains_key(name) {
            warn!(tool = name, "Ignoring request to disable unknown tool");
            return false;
        }
        let changed = self.enabled.remove(name);
        if changed {
            debug!(tool = name, "Tool disabled");
        }
        changed
    }

    /// Check if a tool exists in the registry
    pub fn is_available(&self, name: &str) -> bool {
        self.available.contains_key(name)
    }

    /// Check if a tool is enabled
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.contains(name)
    }

    /// Enabled tool names in ascending order
    pub fn enabled_names(&self) -> Vec<&str> {
        self.enabled.iter().map(|s| s.as_str()).collect()
    }

    /// Available tool names in ascending order
    pub fn available_names(&self) -> Vec<&str> {
        self.available.keys().map(|s| s.as_str()).collect()
    }

    /// Get the number of available tools
    pub fn len(&self) -> usize {
        self.available.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.available.is_empty()
    }
}
