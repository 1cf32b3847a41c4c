//! Per-thread platform binding scopes
//!
//! Some native subsystems must be initialized on each thread that uses them
//! and torn down by whoever initialized them. [`BindingScope`] keeps a
//! per-thread depth per binding name: only the outermost scope on a thread
//! initializes, and it releases only if its own initialize call established
//! the binding.

use crate::platform::{BindingState, PlatformBinding, PlatformError};
use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::trace;

thread_local! {
    static DEPTHS: RefCell<HashMap<String, usize>> = RefCell::new(HashMap::new());
}

/// RAII scope for a platform binding on the current thread.
///
/// Not `Send`: it must be dropped on the thread that entered it.
pub struct BindingScope {
    binding: Arc<dyn PlatformBinding>,
    owned: bool,
    _thread_bound: PhantomData<*const ()>,
}

impl BindingScope {
    /// Enter a scope for `binding` on the current thread
    pub fn enter(binding: Arc<dyn PlatformBinding>) -> Result<Self, PlatformError> {
        let name = binding.name().to_string();
        let depth = Self::depth(&name);

        let owned = if depth == 0 {
            binding.initialize()? == BindingState::Established
        } else {
            false
        };

        DEPTHS.with(|depths| {
            *depths.borrow_mut().entry(name.clone()).or_insert(0) += 1;
        });
        trace!(binding = %name, depth = depth + 1, owned, "Binding scope entered");

        Ok(Self {
            binding,
            owned,
            _thread_bound: PhantomData,
        })
    }

    /// Current nesting depth of `name` on this thread
    pub fn depth(name: &str) -> usize {
        DEPTHS.with(|depths| depths.borrow().get(name).copied().unwrap_or(0))
    }

    /// Whether this scope established the binding and will release it
    pub fn owns_binding(&self) -> bool {
        self.owned
    }
}

impl Drop for BindingScope {
    fn drop(&mut self) {
        let name = self.binding.name();
        DEPTHS.with(|depths| {
            let mut depths = depths.borrow_mut();
            if let Some(depth) = depths.get_mut(name) {
                *depth = depth.saturating_sub(1);
                if *depth == 0 {
                    depths.remove(name);
                }
            }
        });
        if self.owned {
            self.binding.release();
            trace!(binding = %name, "Binding released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct CountingBinding {
        name: &'static str,
        foreign: AtomicBool,
        fail: AtomicBool,
        initialized: AtomicUsize,
        released: AtomicUsize,
    }

    impl CountingBinding {
        fn new(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                foreign: AtomicBool::new(false),
                fail: AtomicBool::new(false),
                initialized: AtomicUsize::new(0),
                released: AtomicUsize::new(0),
            })
        }
    }

    impl PlatformBinding for CountingBinding {
        fn name(&self) -> &str {
            self.name
        }

        fn initialize(&self) -> Result<BindingState, PlatformError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(PlatformError::Unavailable(self.name.to_string()));
            }
            self.initialized.fetch_add(1, Ordering::SeqCst);
            if self.foreign.load(Ordering::SeqCst) {
                Ok(BindingState::AlreadyActive)
            } else {
                Ok(BindingState::Established)
            }
        }

        fn release(&self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_nested_scopes_initialize_once() {
        let binding = CountingBinding::new("nested");
        {
            let outer = BindingScope::enter(binding.clone()).unwrap();
            assert!(outer.owns_binding());
            {
                let inner = BindingScope::enter(binding.clone()).unwrap();
                assert!(!inner.owns_binding());
                assert_eq!(BindingScope::depth("nested"), 2);
            }
            assert_eq!(binding.released.load(Ordering::SeqCst), 0);
        }
        assert_eq!(binding.initialized.load(Ordering::SeqCst), 1);
        assert_eq!(binding.released.load(Ordering::SeqCst), 1);
        assert_eq!(BindingScope::depth("nested"), 0);
    }

    #[test]
    fn test_foreign_binding_is_not_released() {
        let binding = CountingBinding::new("foreign");
        binding.foreign.store(true, Ordering::SeqCst);
        {
            let scope = BindingScope::enter(binding.clone()).unwrap();
            assert!(!scope.owns_binding());
        }
        assert_eq!(binding.initialized.load(Ordering::SeqCst), 1);
        assert_eq!(binding.released.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failed_initialize_leaves_depth_untouched() {
        let binding = CountingBinding::new("failing");
        binding.fail.store(true, Ordering::SeqCst);
        assert!(BindingScope::enter(binding.clone()).is_err());
        assert_eq!(BindingScope::depth("failing"), 0);
        assert_eq!(binding.released.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_depth_is_per_thread() {
        let binding = CountingBinding::new("threads");
        let _here = BindingScope::enter(binding.clone()).unwrap();

        let other = binding.clone();
        std::thread::spawn(move || {
            assert_eq!(BindingScope::depth("threads"), 0);
            let scope = BindingScope::enter(other).unwrap();
            assert!(scope.owns_binding());
        })
        .join()
        .unwrap();

        assert_eq!(binding.initialized.load(Ordering::SeqCst), 2);
        assert_eq!(binding.released.load(Ordering::SeqCst), 1);
        assert_eq!(BindingScope::depth("threads"), 1);
    }
}
