//! Brightness, resolution, screenshots and a display health report

use super::clamp_percent;
use crate::tools::{
    Capability, ResourceClass, Tool, ToolEnvironment, ToolError, ToolExecutionContext,
    ToolMetadata, ToolReply, ToolSchema, parse_args, with_retry,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const DISPLAY_UNAVAILABLE: &str = "Display controls not available on this system";

#[derive(Debug, Deserialize)]
struct BrightnessArgs {
    brightness: f64,
}

/// Set backlight brightness, retrying transient failures
pub struct SetBrightnessTool {
    metadata: ToolMetadata,
    env: Arc<ToolEnvironment>,
}

impl SetBrightnessTool {
    /// Create the tool
    pub fn new(env: Arc<ToolEnvironment>) -> Self {
        Self {
            metadata: ToolMetadata::new(
                "set_brightness",
                "Set the screen brightness to a level between 0 and 100",
            )
            .with_returns("Confirmation with the applied level")
            .with_tag("display")
            .with_resource(ResourceClass::Brightness)
            .with_capability(Capability::Brightness, DISPLAY_UNAVAILABLE)
            .with_min_interval(Duration::from_millis(200)),
            env,
        }
    }
}

#[async_trait]
impl Tool for SetBrightnessTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::single("brightness", "integer", "Brightness level from 0 to 100")
    }

    async fn invoke(&self, args: Value, _ctx: &ToolExecutionContext) -> Result<ToolReply, ToolError> {
        let args: BrightnessArgs = parse_args(self.name(), args)?;
        let level = clamp_percent(args.brightness);

        let env = &self.env;
        let lease = env.acquire(ResourceClass::Brightness).await;
        with_retry(env.retry(), "set_brightness", || {
            env.offload(&lease, move |p| p.display.set_brightness(level))
        })
        .await
        .map_err(|e| e.context("Failed to set brightness"))?;

        info!(level, "Screen brightness set");
        Ok(ToolReply::Text(format!("Screen brightness set to {}%", level)))
    }
}

/// Read backlight brightness
pub struct GetBrightnessTool {
    metadata: ToolMetadata,
    env: Arc<ToolEnvironment>,
}

impl GetBrightnessTool {
    /// Create the tool
    pub fn new(env: Arc<ToolEnvironment>) -> Self {
        Self {
            metadata: ToolMetadata::new("get_brightness", "Get the current screen brightness")
                .with_returns("The brightness as a percentage")
                .with_tag("display")
                .with_resource(ResourceClass::Brightness)
                .with_capability(Capability::Brightness, DISPLAY_UNAVAILABLE),
            env,
        }
    }
}

#[async_trait]
impl Tool for GetBrightnessTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::empty()
    }

    async fn invoke(&self, _args: Value, _ctx: &ToolExecutionContext) -> Result<ToolReply, ToolError> {
        let lease = self.env.acquire(ResourceClass::Brightness).await;
        let level = self
            .env
            .offload(&lease, |p| p.display.brightness())
            .await
            .map_err(|e| e.context("Failed to get brightness"))?;

        Ok(ToolReply::Text(format!(
            "Current screen brightness is {}%",
            level
        )))
    }
}

/// Capture the screen to a timestamped PNG
pub struct ScreenshotTool {
    metadata: ToolMetadata,
    env: Arc<ToolEnvironment>,
}

impl ScreenshotTool {
    /// Create the tool
    pub fn new(env: Arc<ToolEnvironment>) -> Self {
        Self {
            metadata: ToolMetadata::new("screenshot", "Take a screenshot of the entire screen")
                .with_returns("The path the screenshot was saved to")
                .with_tag("display")
                .with_resource(ResourceClass::Screenshot)
                .with_capability(
                    Capability::ScreenCapture,
                    "Screenshot functionality not available on this system",
                )
                .with_min_interval(Duration::from_secs(1)),
            env,
        }
    }
}

#[async_trait]
impl Tool for ScreenshotTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::empty()
    }

    async fn invoke(&self, _args: Value, _ctx: &ToolExecutionContext) -> Result<ToolReply, ToolError> {
        let dir = self.env.screenshot_dir().to_path_buf();
        let filename = chrono::Local::now()
            .format("screenshot_%Y%m%d_%H%M%S.png")
            .to_string();
        let path = dir.join(filename);

        let lease = self.env.acquire(ResourceClass::Screenshot).await;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ToolError::internal(e.to_string()).context("Failed to take screenshot"))?;

        let target = path.clone();
        self.env
            .offload(&lease, move |p| p.capture.capture(&target))
            .await
            .map_err(|e| e.context("Failed to take screenshot"))?;

        info!(path = %path.display(), "Screenshot saved");
        Ok(ToolReply::Text(format!(
            "Screenshot saved successfully to {}",
            path.display()
        )))
    }
}

/// Report the current resolution
pub struct ScreenResolutionTool {
    metadata: ToolMetadata,
    env: Arc<ToolEnvironment>,
}

impl ScreenResolutionTool {
    /// Create the tool
    pub fn new(env: Arc<ToolEnvironment>) -> Self {
        Self {
            metadata: ToolMetadata::new(
                "screen_resolution",
                "Get the current screen resolution",
            )
            .with_returns("Width and height in pixels")
            .with_tag("display")
            .with_resource(ResourceClass::Display)
            .with_capability(
                Capability::Display,
                "Display information not available on this system",
            ),
            env,
        }
    }
}

#[async_trait]
impl Tool for ScreenResolutionTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::empty()
    }

    async fn invoke(&self, _args: Value, _ctx: &ToolExecutionContext) -> Result<ToolReply, ToolError> {
        let lease = self.env.acquire(ResourceClass::Display).await;
        let resolution = self
            .env
            .offload(&lease, |p| p.display.resolution())
            .await
            .map_err(|e| e.context("Failed to get screen resolution"))?;

        Ok(ToolReply::Text(format!(
            "Current screen resolution is {} x {} pixels",
            resolution.width, resolution.height
        )))
    }
}

/// Multi-line report of which subsystems answer
pub struct DisplayHealthTool {
    metadata: ToolMetadata,
    env: Arc<ToolEnvironment>,
}

impl DisplayHealthTool {
    /// Create the tool
    pub fn new(env: Arc<ToolEnvironment>) -> Self {
        Self {
            metadata: ToolMetadata::new(
                "display_health",
                "Check which desktop controls are working on this system",
            )
            .with_returns("One status line per subsystem")
            .with_tag("diagnostics"),
            env,
        }
    }

    fn status_line<T>(label: &str, result: Result<T, ToolError>) -> String {
        match result {
            Ok(_) => format!("{}: ✓ Working", label),
            Err(e) => format!("{}: ✗ Error - {}", label, e.message),
        }
    }
}

#[async_trait]
impl Tool for DisplayHealthTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::empty()
    }

    async fn invoke(&self, _args: Value, _ctx: &ToolExecutionContext) -> Result<ToolReply, ToolError> {
        let env = &self.env;
        let detected: Vec<_> = env.capabilities().iter().map(|c| c.as_str()).collect();
        let mut report = vec![format!(
            "Detected capabilities: {}",
            if detected.is_empty() {
                "none".to_string()
            } else {
                detected.join(", ")
            }
        )];

        let audio = {
            let lease = env.acquire(ResourceClass::Audio).await;
            env.offload_bound(&lease, |p| p.audio.volume()).await
        };
        report.push(Self::status_line("Audio Control", audio));

        let brightness = {
            let lease = env.acquire(ResourceClass::Brightness).await;
            env.offload(&lease, |p| p.display.brightness()).await
        };
        report.push(Self::status_line("Brightness Control", brightness));

        let resolution = {
            let lease = env.acquire(ResourceClass::Display).await;
            env.offload(&lease, |p| p.display.resolution()).await
        };
        report.push(Self::status_line("Display Information", resolution));

        let windows = {
            let lease = env.acquire(ResourceClass::Windows).await;
            env.offload(&lease, |p| p.windows.list_windows()).await
        };
        report.push(Self::status_line("Window Management", windows));

        report.push(if env.has_capability(Capability::ScreenCapture) {
            "Screenshot Capability: ✓ Available".to_string()
        } else {
            "Screenshot Capability: ✗ Not available".to_string()
        });

        Ok(ToolReply::Text(report.join("\n")))
    }
}
