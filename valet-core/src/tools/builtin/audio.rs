//! Master volume and mute

use super::clamp_percent;
use crate::tools::{
    Capability, ResourceClass, Tool, ToolEnvironment, ToolError, ToolExecutionContext,
    ToolMetadata, ToolReply, ToolSchema, parse_args,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

const AUDIO_UNAVAILABLE: &str = "Audio controls not available on this system";

fn audio_metadata(name: &str, description: &str) -> ToolMetadata {
    ToolMetadata::new(name, description)
        .with_tag("audio")
        .with_resource(ResourceClass::Audio)
        .with_capability(Capability::Audio, AUDIO_UNAVAILABLE)
}

#[derive(Debug, Deserialize)]
struct VolumeArgs {
    level: f64,
}

/// Set the master volume
pub struct SetVolumeTool {
    metadata: ToolMetadata,
    env: Arc<ToolEnvironment>,
}

impl SetVolumeTool {
    /// Create the tool
    pub fn new(env: Arc<ToolEnvironment>) -> Self {
        Self {
            metadata: audio_metadata(
                "set_volume",
                "Set the system volume to a level between 0 and 100",
            )
            .with_returns("Confirmation with the applied level"),
            env,
        }
    }
}

#[async_trait]
impl Tool for SetVolumeTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::single("level", "integer", "Volume level from 0 to 100")
    }

    async fn invoke(&self, args: Value, _ctx: &ToolExecutionContext) -> Result<ToolReply, ToolError> {
        let args: VolumeArgs = parse_args(self.name(), args)?;
        let level = clamp_percent(args.level);

        let lease = self.env.acquire(ResourceClass::Audio).await;
        self.env
            .offload_bound(&lease, move |p| p.audio.set_volume(level))
            .await
            .map_err(|e| e.context("Unable to set volume"))?;

        info!(level, "System volume set");
        Ok(ToolReply::Text(format!("System volume set to {}%", level)))
    }
}

/// Read the master volume
pub struct GetVolumeTool {
    metadata: ToolMetadata,
    env: Arc<ToolEnvironment>,
}

impl GetVolumeTool {
    /// Create the tool
    pub fn new(env: Arc<ToolEnvironment>) -> Self {
        Self {
            metadata: audio_metadata("get_volume", "Get the current system volume level")
                .with_returns("The volume as a percentage"),
            env,
        }
    }
}

#[async_trait]
impl Tool for GetVolumeTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::empty()
    }

    async fn invoke(&self, _args: Value, _ctx: &ToolExecutionContext) -> Result<ToolReply, ToolError> {
        let lease = self.env.acquire(ResourceClass::Audio).await;
        let level = self
            .env
            .offload_bound(&lease, |p| p.audio.volume())
            .await
            .map_err(|e| e.context("Unable to get volume"))?;

        Ok(ToolReply::Text(format!("System volume is {}%", level)))
    }
}

/// Mute the default output
pub struct MuteAudioTool {
    metadata: ToolMetadata,
    env: Arc<ToolEnvironment>,
}

impl MuteAudioTool {
    /// Create the tool
    pub fn new(env: Arc<ToolEnvironment>) -> Self {
        Self {
            metadata: audio_metadata("mute_audio", "Mute the system audio"),
            env,
        }
    }
}

#[async_trait]
impl Tool for MuteAudioTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::empty()
    }

    async fn invoke(&self, _args: Value, _ctx: &ToolExecutionContext) -> Result<ToolReply, ToolError> {
        let lease = self.env.acquire(ResourceClass::Audio).await;
        self.env
            .offload_bound(&lease, |p| p.audio.set_muted(true))
            .await
            .map_err(|e| e.context("Unable to mute audio"))?;

        info!("System audio muted");
        Ok(ToolReply::text("System audio muted"))
    }
}

/// Unmute the default output
pub struct UnmuteAudioTool {
    metadata: ToolMetadata,
    env: Arc<ToolEnvironment>,
}

impl UnmuteAudioTool {
    /// Create the tool
    pub fn new(env: Arc<ToolEnvironment>) -> Self {
        Self {
            metadata: audio_metadata("unmute_audio", "Unmute the system audio"),
            env,
        }
    }
}

#[async_trait]
impl Tool for UnmuteAudioTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema::empty()
    }

    async fn invoke(&self, _args: Value, _ctx: &ToolExecutionContext) -> Result<ToolReply, ToolError> {
        let lease = self.env.acquire(ResourceClass::Audio).await;
        self.env
            .offload_bound(&lease, |p| p.audio.set_muted(false))
            .await
            .map_err(|e| e.context("Unable to unmute audio"))?;

        info!("System audio unmuted");
        Ok(ToolReply::text("System audio unmuted"))
    }
}
