//! Subscriber setup for binaries and long-running hosts embedding the layer.
//!
//! The library crates log through the `log` facade; the `tracing-log` bridge
//! turns those records into events so one subscriber sees everything.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Overrides [`LoggingConfig::level`] when set.
pub const LOG_ENV: &str = "NETSTORE_LOG";

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// An `EnvFilter` directive, e.g. `info` or `netstore=debug,warn`.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

impl LoggingConfig {
    pub fn env_filter(&self) -> EnvFilter {
        match std::env::var(LOG_ENV) {
            Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
                .unwrap_or_else(|_| EnvFilter::new(&self.level)),
            _ => EnvFilter::try_new(&self.level).unwrap_or_else(|_| EnvFilter::new("info")),
        }
    }
}

/// Install the global subscriber. Returns `false` when one was already set.
pub fn init(config: &LoggingConfig) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.env_filter())
        .with_target(true);
    let installed = if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };
    if installed {
        tracing::debug!(level = %config.level, json = config.json, "logging initialised");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_info() {
        let config: LoggingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, LoggingConfig::default());
        assert_eq!(config.level, "info");
        assert!(!config.json);
    }
}
