//! Process-wide logging setup

use crate::config::LoggingConfig;
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Build the filter: `RUST_LOG` when set and valid, else the configured level
fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the tracing subscriber once per process.
///
/// Later calls are no-ops, so the level and format chosen first stay in
/// effect. Output goes to stderr.
pub fn init_tracing(config: &LoggingConfig) {
    TRACING_INIT.get_or_init(|| {
        let filter = env_filter(config);
        let result = if config.json {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .try_init()
        };

        if let Err(err) = result {
            eprintln!("tracing init skipped: {err}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing(&LoggingConfig::default());
        init_tracing(&LoggingConfig {
            level: "debug".to_string(),
            json: true,
        });
    }

    #[test]
    fn bad_level_falls_back() {
        let config = LoggingConfig {
            level: "valet=[".to_string(),
            json: false,
        };
        // Must not panic whatever RUST_LOG holds
        let _ = env_filter(&config);
    }
}
