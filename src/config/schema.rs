//! Configuration schema definitions.
//!
//! Daemon settings, read from a TOML file. Every section has defaults so an
//! empty file is a valid configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root settings of the config daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Request handler listener.
    pub handler: HandlerConfig,

    /// Location of the app file.
    pub app: AppFileConfig,

    /// Per-service config files used by linting.
    pub store: StoreConfig,

    /// Hot reload of the app file.
    pub watch: WatchConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Request handler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HandlerConfig {
    /// Bind address (e.g., "127.0.0.1:8090").
    pub bind_address: String,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8090".to_string(),
        }
    }
}

/// Default name and directory of the app file, `<path>/<name>.yml`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppFileConfig {
    pub name: String,
    pub path: PathBuf,
}

impl Default for AppFileConfig {
    fn default() -> Self {
        Self {
            name: "app".to_string(),
            path: PathBuf::from("."),
        }
    }
}

/// Config store selection.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory with one YAML file per service. Unset keeps every service
    /// in the app file.
    ///
    /// Files may be owned by other tools. Linting reads a service's file when
    /// present and the app's copy otherwise, and writes to both.
    pub dir: Option<PathBuf>,
}

/// App file watcher configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchConfig {
    pub enabled: bool,
    pub poll_interval_secs: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: 2,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config.handler.bind_address, "127.0.0.1:8090");
        assert_eq!(config.app.name, "app");
        assert!(config.store.dir.is_none());
        assert!(config.watch.enabled);
    }

    #[test]
    fn test_partial_sections() {
        let config: EngineConfig = toml::from_str(
            r#"
            [app]
            name = "billing"

            [store]
            dir = "services"

            [observability]
            json_logs = true
            "#,
        )
        .unwrap();
        assert_eq!(config.app.name, "billing");
        assert_eq!(config.app.path, PathBuf::from("."));
        assert_eq!(config.store.dir, Some(PathBuf::from("services")));
        assert!(config.observability.json_logs);
        assert_eq!(config.observability.log_level, "info");
    }
}
