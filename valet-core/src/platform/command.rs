//! Desktop backend built on command-line utilities
//!
//! - audio: `pactl`
//! - brightness: `brightnessctl`
//! - resolution: `xrandr`
//! - capture: `grim`, `scrot` or ImageMagick `import`
//! - windows: `wmctrl` and `xdotool`

use super::{
    AudioEndpoint, BindingState, DisplayControl, Platform, PlatformBinding, PlatformError,
    Resolution, ScreenCapture, WindowInfo, WindowManager,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tracing::trace;

static PERCENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)%").expect("valid regex"));
static CURRENT_MODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"current (\d+) x (\d+)").expect("valid regex"));
static WMCTRL_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(0x[0-9a-fA-F]+)\s+(-?\d+)\s+(\S+)\s?(.*)$").expect("valid regex")
});

const DEFAULT_SINK: &str = "@DEFAULT_SINK@";

pub(super) fn system_platform() -> Platform {
    let display = Arc::new(DesktopDisplay);
    Platform {
        audio: Arc::new(PactlAudio),
        display,
        capture: Arc::new(CommandCapture::detect()),
        windows: Arc::new(WmctrlWindows),
        binding: Arc::new(SessionBinding),
    }
}

fn installed(program: &str) -> bool {
    which::which(program).is_ok()
}

/// Run a utility to completion and return its stdout
fn run(program: &str, args: &[&str]) -> Result<String, PlatformError> {
    trace!(program, ?args, "Running platform command");
    let output = Command::new(program).args(args).output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PlatformError::Unavailable(program.to_string())
        } else {
            PlatformError::Io(e)
        }
    })?;

    if !output.status.success() {
        return Err(PlatformError::CommandFailed {
            program: program.to_string(),
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn first_percent(output: &str) -> Result<u8, PlatformError> {
    PERCENT
        .captures(output)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .map(|p| p.min(100) as u8)
        .ok_or_else(|| PlatformError::Parse(format!("no percentage in {:?}", output.trim())))
}

struct PactlAudio;

impl AudioEndpoint for PactlAudio {
    fn probe(&self) -> bool {
        installed("pactl")
    }

    fn volume(&self) -> Result<u8, PlatformError> {
        let output = run("pactl", &["get-sink-volume", DEFAULT_SINK])?;
        first_percent(&output)
    }

    fn set_volume(&self, percent: u8) -> Result<(), PlatformError> {
        let level = format!("{}%", percent);
        run("pactl", &["set-sink-volume", DEFAULT_SINK, &level]).map(|_| ())
    }

    fn set_muted(&self, muted: bool) -> Result<(), PlatformError> {
        let flag = if muted { "1" } else { "0" };
        run("pactl", &["set-sink-mute", DEFAULT_SINK, flag]).map(|_| ())
    }
}

struct DesktopDisplay;

impl DisplayControl for DesktopDisplay {
    fn probe_brightness(&self) -> bool {
        installed("brightnessctl")
    }

    fn probe_resolution(&self) -> bool {
        installed("xrandr")
    }

    fn brightness(&self) -> Result<u8, PlatformError> {
        // device,class,current,percent,max
        let output = run("brightnessctl", &["-m"])?;
        let line = output.lines().next().unwrap_or_default();
        let field = line
            .split(',')
            .nth(3)
            .ok_or_else(|| PlatformError::Parse(format!("short brightnessctl line {:?}", line)))?;
        first_percent(field)
    }

    fn set_brightness(&self, percent: u8) -> Result<(), PlatformError> {
        let level = format!("{}%", percent);
        run("brightnessctl", &["-q", "set", &level]).map(|_| ())
    }

    fn resolution(&self) -> Result<Resolution, PlatformError> {
        let output = run("xrandr", &["--current"])?;
        parse_resolution(&output)
    }
}

fn parse_resolution(output: &str) -> Result<Resolution, PlatformError> {
    let caps = CURRENT_MODE
        .captures(output)
        .ok_or_else(|| PlatformError::Parse("no current mode in xrandr output".to_string()))?;
    let width = caps[1]
        .parse()
        .map_err(|_| PlatformError::Parse(format!("bad width {:?}", &caps[1])))?;
    let height = caps[2]
        .parse()
        .map_err(|_| PlatformError::Parse(format!("bad height {:?}", &caps[2])))?;
    Ok(Resolution { width, height })
}

#[derive(Debug, Clone, Copy)]
enum CaptureProgram {
    Grim,
    Scrot,
    Import,
}

struct CommandCapture {
    program: Option<CaptureProgram>,
}

impl CommandCapture {
    fn detect() -> Self {
        let program = [
            ("grim", CaptureProgram::Grim),
            ("scrot", CaptureProgram::Scrot),
            ("import", CaptureProgram::Import),
        ]
        .into_iter()
        .find(|(name, _)| installed(name))
        .map(|(_, program)| program);
        Self { program }
    }
}

impl ScreenCapture for CommandCapture {
    fn probe(&self) -> bool {
        self.program.is_some()
    }

    fn capture(&self, path: &Path) -> Result<(), PlatformError> {
        let target = path.to_string_lossy();
        match self.program {
            Some(CaptureProgram::Grim) => run("grim", &[&target]),
            Some(CaptureProgram::Scrot) => run("scrot", &["--overwrite", &target]),
            Some(CaptureProgram::Import) => run("import", &["-window", "root", &target]),
            None => Err(PlatformError::Unavailable("screen capture".to_string())),
        }
        .map(|_| ())
    }
}

struct WmctrlWindows;

impl WindowManager for WmctrlWindows {
    fn probe(&self) -> bool {
        installed("wmctrl")
    }

    fn list_windows(&self) -> Result<Vec<WindowInfo>, PlatformError> {
        let output = run("wmctrl", &["-l"])?;
        Ok(parse_window_list(&output))
    }

    fn active_window(&self) -> Result<WindowInfo, PlatformError> {
        let id = run("xdotool", &["getactivewindow"])?.trim().to_string();
        let title = run("xdotool", &["getwindowname", &id])?.trim().to_string();
        Ok(WindowInfo { id, title })
    }

    fn restore(&self, window: &WindowInfo) -> Result<(), PlatformError> {
        run("wmctrl", &["-i", "-r", &window.id, "-b", "remove,hidden"]).map(|_| ())
    }

    fn focus(&self, window: &WindowInfo) -> Result<(), PlatformError> {
        run("wmctrl", &["-i", "-a", &window.id]).map(|_| ())
    }

    fn minimize_all(&self) -> Result<(), PlatformError> {
        run("wmctrl", &["-k", "on"]).map(|_| ())
    }
}

fn parse_window_list(output: &str) -> Vec<WindowInfo> {
    output
        .lines()
        .filter_map(|line| WMCTRL_LINE.captures(line))
        // Desktop -1 holds panels and docks
        .filter(|caps| &caps[2] != "-1")
        .map(|caps| WindowInfo {
            id: caps[1].to_string(),
            title: caps[4].trim().to_string(),
        })
        .collect()
}

/// Command-line utilities need no per-thread setup.
struct SessionBinding;

impl PlatformBinding for SessionBinding {
    fn name(&self) -> &str {
        "desktop-session"
    }

    fn initialize(&self) -> Result<BindingState, PlatformError> {
        Ok(BindingState::Established)
    }

    fn release(&self) {}
}
