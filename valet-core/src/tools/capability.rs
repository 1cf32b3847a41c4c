//! Detected platform capabilities
//!
//! Capabilities are probed once when the tool environment is built. A tool
//! that declares a capability the machine lacks answers with its fixed
//! unavailability message instead of touching the platform.

use crate::platform::Platform;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Platform capabilities that tools may require
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Master volume and mute
    Audio,

    /// Backlight brightness
    Brightness,

    /// Display geometry
    Display,

    /// Full-screen capture
    ScreenCapture,

    /// Window enumeration, focus and minimize
    WindowManagement,
}

impl Capability {
    /// Get all defined capabilities
    pub fn all() -> &'static [Capability] {
        &[
            Capability::Audio,
            Capability::Brightness,
            Capability::Display,
            Capability::ScreenCapture,
            Capability::WindowManagement,
        ]
    }

    /// Get the string name of this capability
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Audio => "audio",
            Capability::Brightness => "brightness",
            Capability::Display => "display",
            Capability::ScreenCapture => "screen_capture",
            Capability::WindowManagement => "window_management",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A set of capabilities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    capabilities: BTreeSet<Capability>,
}

impl CapabilitySet {
    /// Create an empty capability set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a capability set with all capabilities
    pub fn all() -> Self {
        Self::from_capabilities(Capability::all().iter().copied())
    }

    /// Create a capability set from an iterator of capabilities
    pub fn from_capabilities(iter: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            capabilities: iter.into_iter().collect(),
        }
    }

    /// Probe every subsystem of `platform` once
    pub fn probe(platform: &Platform) -> Self {
        let mut set = Self::new();
        if platform.audio.probe() {
            set.add(Capability::Audio);
        }
        if platform.display.probe_brightness() {
            set.add(Capability::Brightness);
        }
        if platform.display.probe_resolution() {
            set.add(Capability::Display);
        }
        if platform.capture.probe() {
            set.add(Capability::ScreenCapture);
        }
        if platform.windows.probe() {
            set.add(Capability::WindowManagement);
        }
        set
    }

    /// Add a capability
    pub fn add(&mut self, cap: Capability) -> &mut Self {
        self.capabilities.insert(cap);
        self
    }

    /// Remove a capability
    pub fn remove(&mut self, cap: Capability) -> &mut Self {
        self.capabilities.remove(&cap);
        self
    }

    /// Check if capability is present
    pub fn contains(&self, cap: Capability) -> bool {
        self.capabilities.contains(&cap)
    }

    /// Get capabilities as iterator
    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities.iter()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Get the number of capabilities
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        Self::from_capabilities(iter)
    }
}
