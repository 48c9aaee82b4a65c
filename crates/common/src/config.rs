use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use validator::Validate;

// Default constants
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_SERVER_NAME: &str = "Steward Server";

pub const DEFAULT_POOL_MIN: u32 = 1;
pub const DEFAULT_POOL_MAX: u32 = 5;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_CLOSE_GRACE_SECS: u64 = 5;

pub const DEFAULT_PREVIEW_ROWS: usize = 100;

pub const DEFAULT_TELEMETRY_ENABLED: bool = false;
pub const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";

#[derive(Debug, Deserialize, Default, Clone, Validate)]
pub struct AppConfig {
    #[serde(default)]
    #[validate(nested)]
    pub server: ServerSettings,
    #[serde(default)]
    pub pool: PoolSettings,
    #[serde(default)]
    pub execution: ExecutionSettings,
    #[serde(default)]
    #[validate(nested)]
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct ServerSettings {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default = "default_server_name")]
    pub name: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            name: default_server_name(),
        }
    }
}

/// Pool bounds applied when a target carries no override of its own.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    #[serde(default = "default_pool_min")]
    pub min_connections: u32,
    #[serde(default = "default_pool_max")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Bounded grace period for `close_all` at shutdown.
    #[serde(default = "default_close_grace_secs")]
    pub close_grace_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            min_connections: default_pool_min(),
            max_connections: default_pool_max(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            close_grace_secs: default_close_grace_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct ExecutionSettings {
    /// Returned rows are truncated to this bound in result snapshots.
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            preview_rows: default_preview_rows(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_otlp_endpoint")]
    #[validate(url)]
    pub endpoint: String,

    #[serde(default = "default_service_name_config")]
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            endpoint: default_otlp_endpoint(),
            service_name: default_service_name_config(),
        }
    }
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

fn default_server_name() -> String {
    DEFAULT_SERVER_NAME.to_string()
}

fn default_pool_min() -> u32 {
    DEFAULT_POOL_MIN
}

fn default_pool_max() -> u32 {
    DEFAULT_POOL_MAX
}

fn default_acquire_timeout_secs() -> u64 {
    DEFAULT_ACQUIRE_TIMEOUT_SECS
}

fn default_idle_timeout_secs() -> u64 {
    DEFAULT_IDLE_TIMEOUT_SECS
}

fn default_close_grace_secs() -> u64 {
    DEFAULT_CLOSE_GRACE_SECS
}

fn default_preview_rows() -> usize {
    DEFAULT_PREVIEW_ROWS
}

fn default_telemetry_enabled() -> bool {
    DEFAULT_TELEMETRY_ENABLED
}

fn default_otlp_endpoint() -> String {
    DEFAULT_OTLP_ENDPOINT.to_string()
}

fn default_service_name_config() -> String {
    DEFAULT_SERVER_NAME.to_string()
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let builder = config::Config::builder();

        let builder = if std::path::Path::new(path).exists() {
            builder.add_source(config::File::with_name(path))
        } else {
            builder
        };

        // Map STEWARD_POOL__MAX_CONNECTIONS to pool.max_connections, etc.
        let builder = builder.add_source(
            config::Environment::with_prefix("STEWARD")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build().context("Failed to build configuration")?;

        let app_config: AppConfig = cfg
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config
            .validate()
            .map_err(|e| anyhow::anyhow!("Configuration validation failed: {:?}", e))?;

        Ok(app_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pool.max_connections, DEFAULT_POOL_MAX);
        assert_eq!(config.execution.preview_rows, DEFAULT_PREVIEW_ROWS);
    }

    #[test]
    fn test_telemetry_config_validation() {
        let config = AppConfig {
            telemetry: TelemetryConfig {
                endpoint: "not_a_url".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
