//! Window management tools
//!
//! All three tools share the `windows` resource class.

use crate::tools::{
    Capability, ResourceClass, Tool, ToolEnvironment, ToolError, ToolExecutionContext,
    ToolMetadata, ToolReply, ToolSchema, parse_args,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Pause after minimizing so the desktop settles before the next call
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Pause between restoring a window and focusing it
const FOCUS_DELAY: Duration = Duration::from_millis(100);

/// Minimize every window
pub struct MinimizeWindowsTool {
    metadata: ToolMetadata,
    env: Arc<ToolEnvironment>,
}

impl MinimizeWindowsTool {
    /// Create the tool
    pub fn new(env: Arc<ToolEnvironment>) -> Self {
        Self {
            metadata: ToolMetadata::new(
                "minimize_windows",
                "Minimize all windows to show the desktop",
            )
            .with_tag("windows")
            .with_resource(ResourceClass::Windows)
            .with_capability(
                Capability::WindowManagement,
                "Window management not available on this system",
            )
            .with_min_interval(Duration::from_millis(500)),
            env,
        }
    }
}

#[async_trait]
impl Tool for MinimizeWindowsTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::empty()
    }

    async fn invoke(&self, _args: Value, _ctx: &ToolExecutionContext) -> Result<ToolReply, ToolError> {
        let lease = self.env.acquire(ResourceClass::Windows).await;
        self.env
            .offload_bound(&lease, |p| p.windows.minimize_all())
            .await
            .map_err(|e| e.context("Failed to minimize windows"))?;
        tokio::time::sleep(SETTLE_DELAY).await;

        info!("All windows minimized");
        Ok(ToolReply::text("All windows have been minimized"))
    }
}

/// Report the focused window's title
pub struct ActiveWindowTool {
    metadata: ToolMetadata,
    env: Arc<ToolEnvironment>,
}

impl ActiveWindowTool {
    /// Create the tool
    pub fn new(env: Arc<ToolEnvironment>) -> Self {
        Self {
            metadata: ToolMetadata::new(
                "active_window",
                "Get the title of the currently active window",
            )
            .with_tag("windows")
            .with_resource(ResourceClass::Windows)
            .with_capability(
                Capability::WindowManagement,
                "Window information not available on this system",
            ),
            env,
        }
    }
}

#[async_trait]
impl Tool for ActiveWindowTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::empty()
    }

    async fn invoke(&self, _args: Value, _ctx: &ToolExecutionContext) -> Result<ToolReply, ToolError> {
        let lease = self.env.acquire(ResourceClass::Windows).await;
        let window = self
            .env
            .offload(&lease, |p| p.windows.active_window())
            .await;

        match window {
            Ok(window) if window.title.is_empty() => {
                Ok(ToolReply::text("No active window with title found"))
            }
            Ok(window) => {
                debug!(title = %window.title, "Active window");
                Ok(ToolReply::Text(format!(
                    "Currently active window: {}",
                    window.title
                )))
            }
            Err(e) if e.kind == crate::tools::ToolErrorKind::NotFound => {
                Ok(ToolReply::text("No active window found"))
            }
            Err(e) => Err(e.context("Failed to get active window info")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SwitchArgs {
    app_name: String,
}

/// Focus the first window whose title contains a name
pub struct SwitchAppTool {
    metadata: ToolMetadata,
    env: Arc<ToolEnvironment>,
}

impl SwitchAppTool {
    /// Create the tool
    pub fn new(env: Arc<ToolEnvironment>) -> Self {
        Self {
            metadata: ToolMetadata::new(
                "switch_app",
                "Switch to an open application by (part of) its window title",
            )
            .with_returns("The title of the focused window")
            .with_tag("windows")
            .with_resource(ResourceClass::Windows)
            .with_capability(
                Capability::WindowManagement,
                "Application switching not available on this system",
            )
            .with_min_interval(Duration::from_millis(300)),
            env,
        }
    }
}

#[async_trait]
impl Tool for SwitchAppTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::single(
            "app_name",
            "string",
            "Name or part of the window title of the application",
        )
    }

    async fn invoke(&self, args: Value, _ctx: &ToolExecutionContext) -> Result<ToolReply, ToolError> {
        let args: SwitchArgs = parse_args(self.name(), args)?;
        let needle = args.app_name.trim().to_lowercase();
        if needle.is_empty() {
            return Err(ToolError::validation(
                "Invalid arguments for switch_app: app_name cannot be empty",
            ));
        }

        let lease = self.env.acquire(ResourceClass::Windows).await;
        let windows = self
            .env
            .offload(&lease, |p| p.windows.list_windows())
            .await
            .map_err(|e| e.context("Failed to switch to application"))?;

        let target = windows
            .into_iter()
            .filter(|w| !w.title.is_empty())
            .find(|w| w.title.to_lowercase().contains(&needle))
            .ok_or_else(|| {
                ToolError::not_found(format!(
                    "Could not find application containing '{}'",
                    args.app_name
                ))
            })?;

        let window = target.clone();
        self.env
            .offload(&lease, move |p| p.windows.restore(&window))
            .await
            .map_err(|e| e.context("Failed to switch to application"))?;
        tokio::time::sleep(FOCUS_DELAY).await;

        let window = target.clone();
        self.env
            .offload(&lease, move |p| p.windows.focus(&window))
            .await
            .map_err(|e| e.context("Failed to switch to application"))?;

        info!(title = %target.title, "Switched application");
        Ok(ToolReply::Text(format!(
            "Switched to application: {}",
            target.title
        )))
    }
}
