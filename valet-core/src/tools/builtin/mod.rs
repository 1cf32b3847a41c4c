//! Built-in desktop and network tools

mod audio;
mod display;
mod web;
mod windows;

pub use audio::{GetVolumeTool, MuteAudioTool, SetVolumeTool, UnmuteAudioTool};
pub use display::{
    DisplayHealthTool, GetBrightnessTool, ScreenResolutionTool, ScreenshotTool, SetBrightnessTool,
};
pub use web::{WeatherTool, WebSearchTool};
pub use windows::{ActiveWindowTool, MinimizeWindowsTool, SwitchAppTool};

use super::environment::ToolEnvironment;
use super::tool::Tool;
use std::sync::Arc;

/// Tools enabled when configuration does not say otherwise
pub const DEFAULT_ENABLED: &[&str] = &[
    "weather",
    "web_search",
    "set_volume",
    "get_volume",
    "mute_audio",
    "set_brightness",
    "get_brightness",
    "screenshot",
    "screen_resolution",
    "minimize_windows",
    "switch_app",
];

/// Every built-in tool, sharing one environment
pub fn all_tools(env: &Arc<ToolEnvironment>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(SetVolumeTool::new(env.clone())),
        Arc::new(GetVolumeTool::new(env.clone())),
        Arc::new(MuteAudioTool::new(env.clone())),
        Arc::new(UnmuteAudioTool::new(env.clone())),
        Arc::new(SetBrightnessTool::new(env.clone())),
        Arc::new(GetBrightnessTool::new(env.clone())),
        Arc::new(ScreenshotTool::new(env.clone())),
        Arc::new(ScreenResolutionTool::new(env.clone())),
        Arc::new(DisplayHealthTool::new(env.clone())),
        Arc::new(MinimizeWindowsTool::new(env.clone())),
        Arc::new(ActiveWindowTool::new(env.clone())),
        Arc::new(SwitchAppTool::new(env.clone())),
        Arc::new(WeatherTool::new(env.clone())),
        Arc::new(WebSearchTool::new(env.clone())),
    ]
}

/// Round and clamp a requested level into `0..=100`
pub fn clamp_percent(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}
