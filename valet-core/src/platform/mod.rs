//! Blocking access to desktop subsystems
//!
//! Every call in this module blocks the calling thread. Tools never call it
//! directly from async code; they offload through
//! [`ToolEnvironment`](crate::tools::ToolEnvironment) onto the blocking pool.
//!
//! Backends:
//! - [`Platform::system`]: shells out to common desktop utilities
//! - [`Platform::unsupported`]: reports every subsystem as missing
//! - [`SimulatedPlatform`]: in-memory state for tests and dry runs

mod command;
mod simulated;

pub use simulated::SimulatedPlatform;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Errors raised by platform backends
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// The subsystem is not present on this machine
    #[error("{0} is not available")]
    Unavailable(String),

    /// The subsystem rejected the call but may accept a retry
    #[error("{0}")]
    Transient(String),

    /// The requested object does not exist
    #[error("{0}")]
    NotFound(String),

    /// An external utility exited unsuccessfully
    #[error("{program} exited with status {status:?}: {stderr}")]
    CommandFailed {
        /// Program that was run
        program: String,
        /// Exit code, if the process exited normally
        status: Option<i32>,
        /// Trimmed standard error
        stderr: String,
    },

    /// Output from the subsystem could not be understood
    #[error("unexpected output: {0}")]
    Parse(String),

    /// IO failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Screen size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

/// A top-level window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    /// Backend-specific window handle
    pub id: String,
    /// Window title (may be empty)
    pub title: String,
}

/// Outcome of a per-thread binding initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    /// This call set the binding up and must release it
    Established,
    /// Someone else already holds the binding on this thread
    AlreadyActive,
}

/// Default audio output device
pub trait AudioEndpoint: Send + Sync {
    /// Whether the endpoint can be controlled on this machine
    fn probe(&self) -> bool;

    /// Master volume as a percentage
    fn volume(&self) -> Result<u8, PlatformError>;

    /// Set master volume to a percentage in `0..=100`
    fn set_volume(&self, percent: u8) -> Result<(), PlatformError>;

    /// Mute or unmute the endpoint
    fn set_muted(&self, muted: bool) -> Result<(), PlatformError>;
}

/// Primary display
pub trait DisplayControl: Send + Sync {
    /// Whether backlight brightness can be read and written
    fn probe_brightness(&self) -> bool;

    /// Whether the display geometry can be queried
    fn probe_resolution(&self) -> bool;

    /// Backlight brightness as a percentage
    fn brightness(&self) -> Result<u8, PlatformError>;

    /// Set backlight brightness to a percentage in `0..=100`
    fn set_brightness(&self, percent: u8) -> Result<(), PlatformError>;

    /// Current screen resolution
    fn resolution(&self) -> Result<Resolution, PlatformError>;
}

/// Full-screen capture
pub trait ScreenCapture: Send + Sync {
    /// Whether a capture backend exists
    fn probe(&self) -> bool;

    /// Capture the whole screen to a PNG at `path`
    fn capture(&self, path: &Path) -> Result<(), PlatformError>;
}

/// Top-level window management
pub trait WindowManager: Send + Sync {
    /// Whether windows can be enumerated and focused
    fn probe(&self) -> bool;

    /// All visible top-level windows, in stacking order
    fn list_windows(&self) -> Result<Vec<WindowInfo>, PlatformError>;

    /// The window holding input focus
    fn active_window(&self) -> Result<WindowInfo, PlatformError>;

    /// Restore a minimized window
    fn restore(&self, window: &WindowInfo) -> Result<(), PlatformError>;

    /// Bring a window to the foreground
    fn focus(&self, window: &WindowInfo) -> Result<(), PlatformError>;

    /// Minimize every window, showing the desktop
    fn minimize_all(&self) -> Result<(), PlatformError>;
}

/// Per-thread setup some native subsystems need before use
pub trait PlatformBinding: Send + Sync {
    /// Name used as the depth-table key
    fn name(&self) -> &str;

    /// Set the binding up on the current thread
    fn initialize(&self) -> Result<BindingState, PlatformError>;

    /// Tear the binding down on the current thread
    fn release(&self);
}

/// Bundle of subsystem backends handed to the tool environment
#[derive(Clone)]
pub struct Platform {
    /// Audio endpoint
    pub audio: Arc<dyn AudioEndpoint>,
    /// Display brightness and geometry
    pub display: Arc<dyn DisplayControl>,
    /// Screen capture
    pub capture: Arc<dyn ScreenCapture>,
    /// Window management
    pub windows: Arc<dyn WindowManager>,
    /// Per-thread binding for audio calls
    pub binding: Arc<dyn PlatformBinding>,
}

impl fmt::Debug for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Platform")
            .field("binding", &self.binding.name())
            .finish_non_exhaustive()
    }
}

impl Platform {
    /// Backend driven by desktop command-line utilities found on `PATH`
    pub fn system() -> Self {
        command::system_platform()
    }

    /// Backend where every subsystem is missing
    pub fn unsupported() -> Self {
        let backend = Arc::new(Unsupported);
        Self {
            audio: backend.clone(),
            display: backend.clone(),
            capture: backend.clone(),
            windows: backend.clone(),
            binding: backend,
        }
    }
}

struct Unsupported;

fn missing<T>(what: &str) -> Result<T, PlatformError> {
    Err(PlatformError::Unavailable(what.to_string()))
}

impl AudioEndpoint for Unsupported {
    fn probe(&self) -> bool {
        false
    }
    fn volume(&self) -> Result<u8, PlatformError> {
        missing("audio endpoint")
    }
    fn set_volume(&self, _percent: u8) -> Result<(), PlatformError> {
        missing("audio endpoint")
    }
    fn set_muted(&self, _muted: bool) -> Result<(), PlatformError> {
        missing("audio endpoint")
    }
}

impl DisplayControl for Unsupported {
    fn probe_brightness(&self) -> bool {
        false
    }
    fn probe_resolution(&self) -> bool {
        false
    }
    fn brightness(&self) -> Result<u8, PlatformError> {
        missing("backlight")
    }
    fn set_brightness(&self, _percent: u8) -> Result<(), PlatformError> {
        missing("backlight")
    }
    fn resolution(&self) -> Result<Resolution, PlatformError> {
        missing("display")
    }
}

impl ScreenCapture for Unsupported {
    fn probe(&self) -> bool {
        false
    }
    fn capture(&self, _path: &Path) -> Result<(), PlatformError> {
        missing("screen capture")
    }
}

impl WindowManager for Unsupported {
    fn probe(&self) -> bool {
        false
    }
    fn list_windows(&self) -> Result<Vec<WindowInfo>, PlatformError> {
        missing("window manager")
    }
    fn active_window(&self) -> Result<WindowInfo, PlatformError> {
        missing("window manager")
    }
    fn restore(&self, _window: &WindowInfo) -> Result<(), PlatformError> {
        missing("window manager")
    }
    fn focus(&self, _window: &WindowInfo) -> Result<(), PlatformError> {
        missing("window manager")
    }
    fn minimize_all(&self) -> Result<(), PlatformError> {
        missing("window manager")
    }
}

impl PlatformBinding for Unsupported {
    fn name(&self) -> &str {
        "unsupported"
    }
    fn initialize(&self) -> Result<BindingState, PlatformError> {
        Ok(BindingState::AlreadyActive)
    }
    fn release(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_reports_nothing() {
        let platform = Platform::unsupported();
        assert!(!platform.audio.probe());
        assert!(!platform.display.probe_brightness());
        assert!(!platform.display.probe_resolution());
        assert!(!platform.capture.probe());
        assert!(!platform.windows.probe());
        assert!(matches!(
            platform.audio.volume(),
            Err(PlatformError::Unavailable(_))
        ));
    }

    #[test]
    fn test_command_failed_display() {
        let err = PlatformError::CommandFailed {
            program: "pactl".to_string(),
            status: Some(1),
            stderr: "Connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "pactl exited with status Some(1): Connection refused"
        );
    }
}
