//! In-memory platform used by tests and `--simulate` runs

use super::{
    AudioEndpoint, BindingState, DisplayControl, Platform, PlatformBinding, PlatformError,
    Resolution, ScreenCapture, WindowInfo, WindowManager,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Minimal PNG signature written for simulated captures
const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug)]
struct DeviceState {
    volume: u8,
    muted: bool,
    brightness: u8,
    resolution: Resolution,
    windows: Vec<WindowInfo>,
    focused: Option<String>,
    restored: Vec<String>,
    desktop_shown: bool,
    captures: Vec<PathBuf>,
}

impl Default for DeviceState {
    fn default() -> Self {
        let windows = ["Terminal", "Mozilla Firefox", "Visual Studio Code", ""]
            .iter()
            .enumerate()
            .map(|(i, title)| WindowInfo {
                id: format!("0x{:08x}", 0x0400_0001 + i),
                title: title.to_string(),
            })
            .collect::<Vec<_>>();
        Self {
            volume: 50,
            muted: false,
            brightness: 70,
            resolution: Resolution {
                width: 1920,
                height: 1080,
            },
            focused: windows.first().map(|w| w.title.clone()),
            windows,
            restored: Vec::new(),
            desktop_shown: false,
            captures: Vec::new(),
        }
    }
}

/// Simulated desktop with fault injection and instrumentation.
///
/// Every operation is keyed by name (`"set_volume"`, `"brightness"`,
/// `"focus"`, ...) for [`fail_next`](Self::fail_next) and
/// [`attempts`](Self::attempts). Overlapping calls into the same subsystem
/// are counted by [`violations`](Self::violations).
#[derive(Debug, Default)]
pub struct SimulatedPlatform {
    state: Mutex<DeviceState>,
    unavailable: AtomicBool,
    latency: Mutex<Duration>,
    failures: Mutex<HashMap<String, u32>>,
    attempts: Mutex<HashMap<String, u32>>,
    in_flight: Mutex<HashMap<&'static str, usize>>,
    violations: AtomicUsize,
    bindings_established: AtomicUsize,
    bindings_released: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct Occupancy<'a> {
    platform: &'a SimulatedPlatform,
    subsystem: &'static str,
}

impl Drop for Occupancy<'_> {
    fn drop(&mut self) {
        let mut in_flight = lock(&self.platform.in_flight);
        if let Some(count) = in_flight.get_mut(self.subsystem) {
            *count = count.saturating_sub(1);
        }
    }
}

impl SimulatedPlatform {
    /// Create a platform with default device state
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create a platform whose subsystems all report unavailable
    pub fn unavailable() -> Arc<Self> {
        let platform = Self::default();
        platform.unavailable.store(true, Ordering::SeqCst);
        Arc::new(platform)
    }

    /// Bundle this simulation as a [`Platform`]
    pub fn platform(self: &Arc<Self>) -> Platform {
        Platform {
            audio: self.clone(),
            display: self.clone(),
            capture: self.clone(),
            windows: self.clone(),
            binding: self.clone(),
        }
    }

    /// Toggle availability of every subsystem
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Add artificial latency to every call
    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.latency) = latency;
    }

    /// Replace the window list with the given titles
    pub fn set_windows<I, S>(&self, titles: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = lock(&self.state);
        state.windows = titles
            .into_iter()
            .enumerate()
            .map(|(i, title)| WindowInfo {
                id: format!("0x{:08x}", 0x0500_0001 + i),
                title: title.into(),
            })
            .collect();
        state.focused = None;
    }

    /// Make the next `count` calls of `operation` fail transiently
    pub fn fail_next(&self, operation: &str, count: u32) {
        lock(&self.failures).insert(operation.to_string(), count);
    }

    /// Number of times `operation` has been attempted
    pub fn attempts(&self, operation: &str) -> u32 {
        lock(&self.attempts).get(operation).copied().unwrap_or(0)
    }

    /// Number of calls that entered a subsystem already in use
    pub fn violations(&self) -> usize {
        self.violations.load(Ordering::SeqCst)
    }

    /// Current volume
    pub fn current_volume(&self) -> u8 {
        lock(&self.state).volume
    }

    /// Current mute state
    pub fn is_muted(&self) -> bool {
        lock(&self.state).muted
    }

    /// Current brightness
    pub fn current_brightness(&self) -> u8 {
        lock(&self.state).brightness
    }

    /// Title of the focused window
    pub fn focused_window(&self) -> Option<String> {
        lock(&self.state).focused.clone()
    }

    /// Titles restored before focusing, in order
    pub fn restored_windows(&self) -> Vec<String> {
        lock(&self.state).restored.clone()
    }

    /// Whether the desktop has been shown
    pub fn desktop_shown(&self) -> bool {
        lock(&self.state).desktop_shown
    }

    /// Paths written by simulated captures
    pub fn captures(&self) -> Vec<PathBuf> {
        lock(&self.state).captures.clone()
    }

    /// Binding scopes established and released so far
    pub fn binding_counts(&self) -> (usize, usize) {
        (
            self.bindings_established.load(Ordering::SeqCst),
            self.bindings_released.load(Ordering::SeqCst),
        )
    }

    fn available(&self) -> bool {
        !self.unavailable.load(Ordering::SeqCst)
    }

    fn enter(&self, subsystem: &'static str) -> Occupancy<'_> {
        let mut in_flight = lock(&self.in_flight);
        let count = in_flight.entry(subsystem).or_insert(0);
        if *count > 0 {
            self.violations.fetch_add(1, Ordering::SeqCst);
        }
        *count += 1;
        Occupancy {
            platform: self,
            subsystem,
        }
    }

    fn call<T>(
        &self,
        subsystem: &'static str,
        operation: &str,
        body: impl FnOnce(&mut DeviceState) -> Result<T, PlatformError>,
    ) -> Result<T, PlatformError> {
        if !self.available() {
            return Err(PlatformError::Unavailable(subsystem.to_string()));
        }

        let _occupancy = self.enter(subsystem);
        *lock(&self.attempts).entry(operation.to_string()).or_insert(0) += 1;

        let latency = *lock(&self.latency);
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }

        {
            let mut failures = lock(&self.failures);
            if let Some(remaining) = failures.get_mut(operation) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(PlatformError::Transient(format!(
                        "simulated {} failure",
                        operation
                    )));
                }
            }
        }

        body(&mut lock(&self.state))
    }
}

impl AudioEndpoint for SimulatedPlatform {
    fn probe(&self) -> bool {
        self.available()
    }

    fn volume(&self) -> Result<u8, PlatformError> {
        self.call("audio", "volume", |s| Ok(s.volume))
    }

    fn set_volume(&self, percent: u8) -> Result<(), PlatformError> {
        self.call("audio", "set_volume", |s| {
            s.volume = percent.min(100);
            Ok(())
        })
    }

    fn set_muted(&self, muted: bool) -> Result<(), PlatformError> {
        self.call("audio", "set_muted", |s| {
            s.muted = muted;
            Ok(())
        })
    }
}

impl DisplayControl for SimulatedPlatform {
    fn probe_brightness(&self) -> bool {
        self.available()
    }

    fn probe_resolution(&self) -> bool {
        self.available()
    }

    fn brightness(&self) -> Result<u8, PlatformError> {
        self.call("brightness", "brightness", |s| Ok(s.brightness))
    }

    fn set_brightness(&self, percent: u8) -> Result<(), PlatformError> {
        self.call("brightness", "set_brightness", |s| {
            s.brightness = percent.min(100);
            Ok(())
        })
    }

    fn resolution(&self) -> Result<Resolution, PlatformError> {
        self.call("display", "resolution", |s| Ok(s.resolution))
    }
}

impl ScreenCapture for SimulatedPlatform {
    fn probe(&self) -> bool {
        self.available()
    }

    fn capture(&self, path: &Path) -> Result<(), PlatformError> {
        self.call("screenshot", "capture", |s| {
            std::fs::write(path, PNG_SIGNATURE)?;
            s.captures.push(path.to_path_buf());
            Ok(())
        })
    }
}

impl WindowManager for SimulatedPlatform {
    fn probe(&self) -> bool {
        self.available()
    }

    fn list_windows(&self) -> Result<Vec<WindowInfo>, PlatformError> {
        self.call("windows", "list_windows", |s| Ok(s.windows.clone()))
    }

    fn active_window(&self) -> Result<WindowInfo, PlatformError> {
        self.call("windows", "active_window", |s| {
            let focused = s
                .focused
                .as_ref()
                .ok_or_else(|| PlatformError::NotFound("no window has focus".to_string()))?;
            s.windows
                .iter()
                .find(|w| &w.title == focused)
                .cloned()
                .ok_or_else(|| PlatformError::NotFound(format!("window {:?} is gone", focused)))
        })
    }

    fn restore(&self, window: &WindowInfo) -> Result<(), PlatformError> {
        self.call("windows", "restore", |s| {
            s.desktop_shown = false;
            s.restored.push(window.title.clone());
            Ok(())
        })
    }

    fn focus(&self, window: &WindowInfo) -> Result<(), PlatformError> {
        self.call("windows", "focus", |s| {
            if !s.windows.iter().any(|w| w.id == window.id) {
                return Err(PlatformError::NotFound(format!(
                    "window {} is gone",
                    window.id
                )));
            }
            s.focused = Some(window.title.clone());
            Ok(())
        })
    }

    fn minimize_all(&self) -> Result<(), PlatformError> {
        self.call("windows", "minimize_all", |s| {
            s.desktop_shown = true;
            Ok(())
        })
    }
}

impl PlatformBinding for SimulatedPlatform {
    fn name(&self) -> &str {
        "simulated-audio"
    }

    fn initialize(&self) -> Result<BindingState, PlatformError> {
        self.bindings_established.fetch_add(1, Ordering::SeqCst);
        Ok(BindingState::Established)
    }

    fn release(&self) {
        self.bindings_released.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injected_failures_then_success() {
        let sim = SimulatedPlatform::new();
        sim.fail_next("set_brightness", 2);

        assert!(matches!(
            sim.set_brightness(40),
            Err(PlatformError::Transient(_))
        ));
        assert!(sim.set_brightness(40).is_err());
        assert!(sim.set_brightness(40).is_ok());
        assert_eq!(sim.attempts("set_brightness"), 3);
        assert_eq!(sim.current_brightness(), 40);
    }

    #[test]
    fn test_unavailable_short_circuits() {
        let sim = SimulatedPlatform::unavailable();
        assert!(!AudioEndpoint::probe(sim.as_ref()));
        assert!(matches!(sim.volume(), Err(PlatformError::Unavailable(_))));
        assert_eq!(sim.attempts("volume"), 0);

        sim.set_available(true);
        assert_eq!(sim.volume().unwrap(), 50);
    }

    #[test]
    fn test_overlapping_calls_are_counted() {
        let sim = SimulatedPlatform::new();
        sim.set_latency(Duration::from_millis(150));

        let a = {
            let sim = sim.clone();
            std::thread::spawn(move || sim.minimize_all())
        };
        let b = {
            let sim = sim.clone();
            std::thread::spawn(move || sim.list_windows().map(|_| ()))
        };
        a.join().unwrap().unwrap();
        b.join().unwrap().unwrap();

        assert_eq!(sim.violations(), 1);
    }

    #[test]
    fn test_focus_tracks_window() {
        let sim = SimulatedPlatform::new();
        sim.set_windows(["Editor", "Browser"]);
        let windows = sim.list_windows().unwrap();
        sim.focus(&windows[1]).unwrap();
        assert_eq!(sim.focused_window().as_deref(), Some("Browser"));
        assert_eq!(sim.active_window().unwrap().title, "Browser");
    }
}
