//! Shared state handed to every built-in tool
//!
//! One environment is built per assistant session. It owns the resource lock
//! table, the platform backends, the capabilities probed at construction,
//! and the HTTP client used by network tools.

use super::binding::BindingScope;
use super::capability::{Capability, CapabilitySet};
use super::guard::{ResourceClass, ResourceGuards, ResourceLease};
use super::result::ToolError;
use super::retry::RetryConfig;
use crate::config::{ServicesConfig, ValetConfig};
use crate::error::{Result, ValetError};
use crate::platform::{Platform, PlatformError};
use reqwest::Client;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

/// Session-scoped tool state
pub struct ToolEnvironment {
    guards: ResourceGuards,
    platform: Platform,
    capabilities: CapabilitySet,
    retry: RetryConfig,
    screenshot_dir: PathBuf,
    services: ServicesConfig,
    http: Client,
}

impl ToolEnvironment {
    /// Build an environment with default settings, probing `platform` once
    pub fn new(platform: Platform) -> Self {
        let capabilities = CapabilitySet::probe(&platform);
        Self {
            guards: ResourceGuards::new(),
            platform,
            capabilities,
            retry: RetryConfig::default(),
            screenshot_dir: PathBuf::from("screenshots"),
            services: ServicesConfig::default(),
            http: Client::new(),
        }
    }

    /// Build an environment from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(platform: Platform, config: &ValetConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.services.timeout)
            .build()
            .map_err(|e| ValetError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        let env = Self {
            retry: config.tools.retry.clone(),
            screenshot_dir: config.tools.screenshot_dir.clone(),
            services: config.services.clone(),
            http,
            ..Self::new(platform)
        };

        info!(
            capabilities = ?env.capabilities.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
            "Platform capabilities detected"
        );
        Ok(env)
    }

    /// Builder: set retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Builder: set screenshot directory
    pub fn with_screenshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshot_dir = dir.into();
        self
    }

    /// Builder: set service endpoints
    pub fn with_services(mut self, services: ServicesConfig) -> Self {
        self.services = services;
        self
    }

    /// Capabilities detected at construction
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Check a single capability
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability)
    }

    /// Retry policy for flaky platform calls
    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// Directory screenshots are written to
    pub fn screenshot_dir(&self) -> &Path {
        &self.screenshot_dir
    }

    /// Remote service endpoints
    pub fn services(&self) -> &ServicesConfig {
        &self.services
    }

    /// HTTP client for network tools
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Resource lock table
    pub fn guards(&self) -> &ResourceGuards {
        &self.guards
    }

    /// Wait for exclusive use of a resource class
    pub async fn acquire(&self, class: ResourceClass) -> ResourceLease {
        self.guards.acquire(class).await
    }

    /// Run a blocking platform call on the blocking pool.
    ///
    /// The call keeps `lease`'s resource held until it returns, even if the
    /// awaiting future is dropped by a timeout or cancellation first. A panic
    /// inside `call` resumes on the awaiting task so the runtime's
    /// containment reports it.
    pub async fn offload<T, F>(
        &self,
        lease: &ResourceLease,
        call: F,
    ) -> std::result::Result<T, ToolError>
    where
        F: FnOnce(&Platform) -> std::result::Result<T, PlatformError> + Send + 'static,
        T: Send + 'static,
    {
        let platform = self.platform.clone();
        let hold = lease.hold();
        join(
            tokio::task::spawn_blocking(move || {
                let _hold = hold;
                call(&platform)
            })
            .await,
        )
    }

    /// Like [`offload`](Self::offload), inside a binding scope on the worker thread
    pub async fn offload_bound<T, F>(
        &self,
        lease: &ResourceLease,
        call: F,
    ) -> std::result::Result<T, ToolError>
    where
        F: FnOnce(&Platform) -> std::result::Result<T, PlatformError> + Send + 'static,
        T: Send + 'static,
    {
        let platform = self.platform.clone();
        let hold = lease.hold();
        join(
            tokio::task::spawn_blocking(move || {
                let _hold = hold;
                let _scope = BindingScope::enter(platform.binding.clone())?;
                call(&platform)
            })
            .await,
        )
    }
}

fn join<T>(
    joined: std::result::Result<std::result::Result<T, PlatformError>, tokio::task::JoinError>,
) -> std::result::Result<T, ToolError> {
    match joined {
        Ok(result) => result.map_err(ToolError::from),
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(ToolError::internal(format!("platform call aborted: {}", e))),
    }
}

impl fmt::Debug for ToolEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolEnvironment")
            .field("platform", &self.platform)
            .field("capabilities", &self.capabilities)
            .field("retry", &self.retry)
            .field("screenshot_dir", &self.screenshot_dir)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::SimulatedPlatform;
    use crate::tools::ToolErrorKind;

    #[tokio::test]
    async fn test_offload_runs_platform_call() {
        let sim = SimulatedPlatform::new();
        let env = ToolEnvironment::new(sim.platform());
        let lease = env.acquire(ResourceClass::Audio).await;
        let volume = env.offload(&lease, |p| p.audio.volume()).await.unwrap();
        assert_eq!(volume, 50);
    }

    #[tokio::test]
    async fn test_offload_bound_opens_and_closes_binding() {
        let sim = SimulatedPlatform::new();
        let env = ToolEnvironment::new(sim.platform());
        let lease = env.acquire(ResourceClass::Audio).await;
        env.offload_bound(&lease, |p| p.audio.set_muted(true))
            .await
            .unwrap();
        assert!(sim.is_muted());
        assert_eq!(sim.binding_counts(), (1, 1));
    }

    #[tokio::test]
    async fn test_offload_maps_platform_errors() {
        let env = ToolEnvironment::new(Platform::unsupported());
        let lease = env.acquire(ResourceClass::Audio).await;
        let err = env.offload(&lease, |p| p.audio.volume()).await.unwrap_err();
        assert_eq!(err.kind, ToolErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn test_abandoned_call_keeps_resource_held() {
        let sim = SimulatedPlatform::new();
        sim.set_latency(std::time::Duration::from_millis(200));
        let env = ToolEnvironment::new(sim.platform());

        let call = async {
            let lease = env.acquire(ResourceClass::Audio).await;
            env.offload(&lease, |p| p.audio.set_volume(30)).await
        };
        let abandoned =
            tokio::time::timeout(std::time::Duration::from_millis(20), call).await;
        assert!(abandoned.is_err());

        // The next caller waits for the platform call still in flight
        let lease = env.acquire(ResourceClass::Audio).await;
        let volume = env.offload(&lease, |p| p.audio.volume()).await.unwrap();
        assert_eq!(volume, 30);
        assert_eq!(sim.violations(), 0);
    }

    #[test]
    fn test_capabilities_probed_once() {
        let sim = SimulatedPlatform::new();
        let env = ToolEnvironment::new(sim.platform());
        sim.set_available(false);
        // Probed at construction; later changes are not observed
        assert!(env.has_capability(Capability::Audio));
    }
}
