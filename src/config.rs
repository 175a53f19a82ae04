//! ==============================================================================
//! config.rs - runtime configuration loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `config/roomwatch.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - FeedConfig: database url, room entity path, reconnect backoff.
//!     - WindowConfig: rolling chart window capacity.
//!     - StartupConfig: loading-spinner timeout.
//!     - ServerConfig: dashboard bind address.
//!     - LoggingConfig: default log level (RUST_LOG overrides).
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MonitorConfig {
    pub feed: FeedConfig,
    pub window: WindowConfig,
    pub startup: StartupConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    /// where this config came from; None means built-in defaults.
    /// set by load_or_default so log_summary can report it after the
    /// logger (whose level lives in this very config) is up.
    #[serde(skip)]
    pub source: Option<std::path::PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FeedConfig {
    /// base url of the hosted realtime database
    pub base_url: String,
    /// entity path of the monitored room
    pub room: String,
    /// wait between reconnect attempts after a stream error
    pub reconnect_backoff_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WindowConfig {
    /// rolling window capacity in chart points
    pub capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StartupConfig {
    /// exit the loading state after this long, with or without data
    pub loading_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl MonitorConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        let config: MonitorConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;

        Ok(config)
    }

    /// Load with default fallback. runs before the logger is initialized,
    /// so hard failures go to stderr and provenance is reported later by
    /// log_summary.
    pub fn load_or_default() -> Self {
        let paths = [
            std::path::PathBuf::from("config").join("roomwatch.toml"),
            std::path::PathBuf::from("..").join("config").join("roomwatch.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(mut config) => {
                        config.source = Some(path.clone());
                        return config;
                    }
                    Err(e) => {
                        eprintln!("[CONFIG] Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        Self::default()
    }

    /// Log configuration summary at startup
    pub fn log_summary(&self) {
        match &self.source {
            Some(path) => log::info!("[CONFIG] Loaded from {}", path.display()),
            None => log::warn!("[CONFIG] No config file found - using defaults"),
        }
        log::info!("[CONFIG] Feed: {}/{}", self.feed.base_url, self.feed.room);
        log::info!(
            "[CONFIG] Window capacity: {} | Loading timeout: {}ms | Backoff: {}ms",
            self.window.capacity,
            self.startup.loading_timeout_ms,
            self.feed.reconnect_backoff_ms
        );
        log::info!("[CONFIG] Dashboard bind: {}", self.server.bind);
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            feed: FeedConfig::default(),
            window: WindowConfig::default(),
            startup: StartupConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            source: None,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            // realtime database emulator default; point at the hosted
            // instance in config/roomwatch.toml
            base_url: "http://127.0.0.1:9000".to_string(),
            room: "room1".to_string(),
            reconnect_backoff_ms: 3000,
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { capacity: 20 }
    }
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            loading_timeout_ms: 2000,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_defaults() {
        let config = MonitorConfig::default();
        assert_eq!(config.window.capacity, 20);
        assert_eq!(config.startup.loading_timeout_ms, 2000);
        assert_eq!(config.feed.room, "room1");
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: MonitorConfig = toml::from_str(
            r#"
            [feed]
            base_url = "https://rooms.example.com"
            room = "lab"

            [window]
            capacity = 15
            "#,
        )
        .unwrap();
        assert_eq!(config.feed.base_url, "https://rooms.example.com");
        assert_eq!(config.feed.room, "lab");
        assert_eq!(config.window.capacity, 15);
        // untouched sections keep their defaults
        assert_eq!(config.startup.loading_timeout_ms, 2000);
        assert_eq!(config.logging.level, "info");
    }
}
