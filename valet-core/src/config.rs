//! Configuration types for the Valet assistant

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, ValetError};
use crate::tools::RetryConfig;

/// Main configuration for the Valet assistant
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ValetConfig {
    /// Assistant identity
    #[serde(default)]
    pub assistant: AssistantConfig,

    /// Tool registry and runtime configuration
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Memory collaborator configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Remote service endpoints used by network tools
    #[serde(default)]
    pub services: ServicesConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Assistant identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Identifier used to scope memory retrieval and storage
    pub user_id: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            user_id: "default".to_string(),
        }
    }
}

/// Tool registry and runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Names enabled at startup (None = the built-in default set)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<Vec<String>>,

    /// Default timeout for a single tool invocation
    #[serde(with = "humantime_serde")]
    pub default_timeout: Duration,

    /// Per-tool timeout overrides
    #[serde(default)]
    pub tool_timeouts: HashMap<String, humantime_serde::Serde<Duration>>,

    /// Per-tool minimum call interval overrides
    #[serde(default)]
    pub rate_limits: HashMap<String, humantime_serde::Serde<Duration>>,

    /// Retry policy for flaky platform calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Directory screenshots are written to
    pub screenshot_dir: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            default_timeout: Duration::from_secs(30),
            tool_timeouts: HashMap::new(),
            rate_limits: HashMap::new(),
            retry: RetryConfig::default(),
            screenshot_dir: PathBuf::from("screenshots"),
        }
    }
}

impl ToolsConfig {
    /// Timeout for a specific tool
    pub fn timeout_for(&self, tool_name: &str) -> Duration {
        self.tool_timeouts
            .get(tool_name)
            .map(|d| **d)
            .unwrap_or(self.default_timeout)
    }

    /// Configured interval override for a tool, if any
    pub fn rate_limit_for(&self, tool_name: &str) -> Option<Duration> {
        self.rate_limits.get(tool_name).map(|d| **d)
    }

    /// Add a tool-specific timeout
    pub fn with_tool_timeout(mut self, tool_name: impl Into<String>, timeout: Duration) -> Self {
        self.tool_timeouts.insert(tool_name.into(), timeout.into());
        self
    }

    /// Add a tool-specific minimum interval
    pub fn with_rate_limit(mut self, tool_name: impl Into<String>, interval: Duration) -> Self {
        self.rate_limits.insert(tool_name.into(), interval.into());
        self
    }
}

/// Memory collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Backend mode
    pub mode: MemoryMode,

    /// Request timeout for server mode
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            mode: MemoryMode::InMemory,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Memory backend mode
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MemoryMode {
    /// Process-local memory, lost on exit
    InMemory,

    /// Hosted memory service
    Server {
        /// Base URL of the memory service
        url: String,
        /// Optional API key
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_key: Option<String>,
    },
}

/// Endpoints for network-backed tools and the remote tool server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    /// Weather lookup endpoints
    #[serde(default)]
    pub weather: WeatherServiceConfig,

    /// Web search endpoint
    #[serde(default)]
    pub search: SearchServiceConfig,

    /// Remote tool server URL, handed to the agent driver as-is
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_server_url: Option<String>,

    /// HTTP timeout for network tools
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            weather: WeatherServiceConfig::default(),
            search: SearchServiceConfig::default(),
            tool_server_url: None,
            timeout: Duration::from_secs(15),
        }
    }
}

/// Weather service endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherServiceConfig {
    /// City name → coordinates lookup
    pub geocoding_url: String,
    /// Current conditions for coordinates
    pub forecast_url: String,
}

impl Default for WeatherServiceConfig {
    fn default() -> Self {
        Self {
            geocoding_url: "https://geocoding-api.open-meteo.com/v1/search".to_string(),
            forecast_url: "https://api.open-meteo.com/v1/forecast".to_string(),
        }
    }
}

/// Web search endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchServiceConfig {
    /// HTML search endpoint
    pub endpoint: String,
    /// Maximum number of result links returned
    pub max_results: usize,
}

impl Default for SearchServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://html.duckduckgo.com/html/".to_string(),
            max_results: 5,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset (trace, debug, info, warn, error)
    pub level: String,

    /// Emit JSON lines instead of compact text
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl ValetConfig {
    /// Load configuration from files and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. `valet/valet.toml` in the user configuration directory
    /// 3. `valet.toml` in the working directory
    /// 4. The file named by `VALET_CONFIG_PATH`
    /// 5. `VALET_`-prefixed environment variables (`__` separates sections)
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is invalid or validation fails.
    pub fn load() -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml},
        };

        let mut figment = Figment::from(Serialized::defaults(ValetConfig::default()));

        if let Some(dir) = dirs::config_dir() {
            figment = figment.merge(Toml::file(dir.join("valet").join("valet.toml")));
        }

        figment = figment.merge(Toml::file("valet.toml"));

        if let Ok(path) = std::env::var("VALET_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        let config: ValetConfig = figment
            .merge(Env::prefixed("VALET_").split("__"))
            .extract()
            .map_err(|e| {
                ValetError::Configuration(format!("Failed to load configuration: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path on top of the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Serialized, Toml},
        };

        let path = path.as_ref();
        if !path.exists() {
            return Err(ValetError::Configuration(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let config: ValetConfig = Figment::from(Serialized::defaults(ValetConfig::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| {
                ValetError::Configuration(format!("Failed to load configuration file: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.assistant.user_id.trim().is_empty() {
            return Err(ValetError::Configuration(
                "assistant.user_id cannot be empty".to_string(),
            ));
        }
        if self.tools.retry.max_attempts == 0 {
            return Err(ValetError::Configuration(
                "tools.retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.services.search.max_results == 0 {
            return Err(ValetError::Configuration(
                "services.search.max_results must be positive".to_string(),
            ));
        }
        if let MemoryMode::Server { url, .. } = &self.memory.mode {
            if url.trim().is_empty() {
                return Err(ValetError::Configuration(
                    "memory.mode.url cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = ValetConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tools.default_timeout, Duration::from_secs(30));
        assert_eq!(config.tools.retry.max_attempts, 3);
        assert_eq!(config.services.search.max_results, 5);
    }

    #[test]
    fn test_from_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[assistant]
user_id = "tony"

[tools]
default_timeout = "5s"
screenshot_dir = "/tmp/shots"
enabled = ["get_volume", "set_volume"]

[tools.rate_limits]
set_volume = "250ms"

[memory.mode]
type = "server"
url = "https://memory.example.com"
api_key = "secret"
"#
        )
        .unwrap();

        let config = ValetConfig::from_file(file.path()).unwrap();
        assert_eq!(config.assistant.user_id, "tony");
        assert_eq!(config.tools.default_timeout, Duration::from_secs(5));
        assert_eq!(config.tools.screenshot_dir, PathBuf::from("/tmp/shots"));
        assert_eq!(
            config.tools.rate_limit_for("set_volume"),
            Some(Duration::from_millis(250))
        );
        assert_eq!(config.tools.rate_limit_for("get_volume"), None);
        assert_eq!(config.tools.enabled.as_ref().map(|e| e.len()), Some(2));
        assert!(matches!(config.memory.mode, MemoryMode::Server { .. }));
        // Untouched sections keep their defaults
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = ValetConfig::from_file("/definitely/not/here/valet.toml");
        assert!(matches!(result, Err(ValetError::Configuration(_))));
    }

    #[test]
    fn test_validation_rejects_zero_attempts() {
        let mut config = ValetConfig::default();
        config.tools.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_empty_user() {
        let mut config = ValetConfig::default();
        config.assistant.user_id = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_search_results() {
        let mut config = ValetConfig::default();
        config.services.search.max_results = 0;
        assert!(matches!(config.validate(), Err(ValetError::Configuration(_))));
    }

    #[test]
    fn test_env_overrides_nested_setting() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("VALET_TOOLS__DEFAULT_TIMEOUT", "5s");
            jail.set_env("VALET_LOGGING__JSON", "true");

            let config = ValetConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.tools.default_timeout, Duration::from_secs(5));
            assert!(config.logging.json);
            assert_eq!(config.assistant.user_id, "default");
            Ok(())
        });
    }

    #[test]
    fn test_config_path_beats_local_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "valet.toml",
                r#"
[assistant]
user_id = "local"

[tools]
default_timeout = "10s"
"#,
            )?;
            jail.create_file("override.toml", "[assistant]\nuser_id = \"chosen\"\n")?;
            jail.set_env("VALET_CONFIG_PATH", "override.toml");

            let config = ValetConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.assistant.user_id, "chosen");
            // Settings the later file leaves alone still come from valet.toml
            assert_eq!(config.tools.default_timeout, Duration::from_secs(10));
            Ok(())
        });
    }

    #[test]
    fn test_env_values_are_validated() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("VALET_ASSISTANT__USER_ID", "");
            let result = ValetConfig::load();
            assert!(matches!(result, Err(ValetError::Configuration(_))));
            Ok(())
        });
    }

    #[test]
    fn test_timeout_override() {
        let tools = ToolsConfig::default().with_tool_timeout("screenshot", Duration::from_secs(2));
        assert_eq!(tools.timeout_for("screenshot"), Duration::from_secs(2));
        assert_eq!(tools.timeout_for("get_volume"), Duration::from_secs(30));
    }
}
