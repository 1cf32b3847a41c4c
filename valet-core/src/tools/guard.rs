//! Per-resource mutual exclusion
//!
//! Native desktop subsystems are not safe to drive from two calls at once.
//! Every tool that touches one acquires the lease for its [`ResourceClass`]
//! for the whole body; tools sharing a subsystem share a class.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::trace;

/// Platform subsystem a tool serializes on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceClass {
    /// Audio endpoint
    Audio,
    /// Backlight
    Brightness,
    /// Display geometry
    Display,
    /// Screen capture
    Screenshot,
    /// Window manager
    Windows,
}

impl ResourceClass {
    /// Get the string name of this class
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceClass::Audio => "audio",
            ResourceClass::Brightness => "brightness",
            ResourceClass::Display => "display",
            ResourceClass::Screenshot => "screenshot",
            ResourceClass::Windows => "windows",
        }
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lazily populated table of one async mutex per resource class.
///
/// Entries are created on first use and never removed.
#[derive(Default)]
pub struct ResourceGuards {
    locks: Mutex<HashMap<ResourceClass, Arc<AsyncMutex<()>>>>,
}

impl ResourceGuards {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, class: ResourceClass) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(class)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Wait for exclusive use of `class`
    pub async fn acquire(&self, class: ResourceClass) -> ResourceLease {
        let lock = self.lock_for(class);
        let guard = lock.lock_owned().await;
        trace!(resource = %class, "Resource acquired");
        ResourceLease {
            class,
            guard: Arc::new(guard),
        }
    }

    /// Take `class` only if nobody holds it
    pub fn try_acquire(&self, class: ResourceClass) -> Option<ResourceLease> {
        let lock = self.lock_for(class);
        lock.try_lock_owned().ok().map(|guard| ResourceLease {
            class,
            guard: Arc::new(guard),
        })
    }

    /// Number of classes that have been used so far
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .map(|locks| locks.len())
            .unwrap_or_default()
    }

    /// Check whether no class has been used yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ResourceGuards {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceGuards")
            .field("classes", &self.len())
            .finish()
    }
}

/// Exclusive use of a resource class.
///
/// The class is released once the lease and every [`LeaseHold`] taken from
/// it have been dropped.
pub struct ResourceLease {
    class: ResourceClass,
    guard: Arc<OwnedMutexGuard<()>>,
}

impl ResourceLease {
    /// Class this lease covers
    pub fn class(&self) -> ResourceClass {
        self.class
    }

    /// Keep the class held for as long as the returned handle lives,
    /// even if this lease is dropped first
    pub fn hold(&self) -> LeaseHold {
        LeaseHold {
            class: self.class,
            _guard: self.guard.clone(),
        }
    }
}

impl Drop for ResourceLease {
    fn drop(&mut self) {
        if Arc::strong_count(&self.guard) == 1 {
            trace!(resource = %self.class, "Resource released");
        } else {
            trace!(resource = %self.class, "Resource still held by a platform call");
        }
    }
}

/// Share of a [`ResourceLease`] carried into a blocking platform call
pub struct LeaseHold {
    class: ResourceClass,
    _guard: Arc<OwnedMutexGuard<()>>,
}

impl fmt::Debug for LeaseHold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeaseHold")
            .field("class", &self.class)
            .finish()
    }
}

impl fmt::Debug for ResourceLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceLease")
            .field("class", &self.class)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_class_is_exclusive() {
        let guards = ResourceGuards::new();
        let lease = guards.acquire(ResourceClass::Windows).await;
        assert!(guards.try_acquire(ResourceClass::Windows).is_none());
        drop(lease);
        assert!(guards.try_acquire(ResourceClass::Windows).is_some());
    }

    #[tokio::test]
    async fn test_classes_are_independent() {
        let guards = ResourceGuards::new();
        let _audio = guards.acquire(ResourceClass::Audio).await;
        let brightness = guards.try_acquire(ResourceClass::Brightness);
        assert_eq!(brightness.map(|l| l.class()), Some(ResourceClass::Brightness));
        assert_eq!(guards.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_critical_sections_do_not_overlap() {
        let guards = Arc::new(ResourceGuards::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let guards = guards.clone();
                let inside = inside.clone();
                let overlaps = overlaps.clone();
                tokio::spawn(async move {
                    let _lease = guards.acquire(ResourceClass::Audio).await;
                    if inside.fetch_add(1, Ordering::SeqCst) > 0 {
                        overlaps.fetch_add(1, Ordering::SeqCst);
                    }
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_hold_outlives_lease() {
        let guards = ResourceGuards::new();
        let lease = guards.acquire(ResourceClass::Audio).await;
        let hold = lease.hold();
        drop(lease);
        assert!(guards.try_acquire(ResourceClass::Audio).is_none());
        drop(hold);
        assert!(guards.try_acquire(ResourceClass::Audio).is_some());
    }

    #[tokio::test]
    async fn test_lease_released_on_early_return() {
        async fn fails(guards: &ResourceGuards) -> Result<(), &'static str> {
            let _lease = guards.acquire(ResourceClass::Display).await;
            Err("boom")
        }

        let guards = ResourceGuards::new();
        assert!(fails(&guards).await.is_err());
        assert!(guards.try_acquire(ResourceClass::Display).is_some());
    }
}
