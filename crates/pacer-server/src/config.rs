//! Application configuration.

use pacer_control::ControlConfig;
use pacer_core::{ConfigPatch, DispatchConfig};
use pacer_delivery::HttpDeliveryConfig;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log filter used when `RUST_LOG` is not set (e.g. "info,pacer=debug").
    #[serde(default)]
    pub log_filter: Option<String>,
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// How long shutdown waits for an active run to exit (ms).
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
    /// HTTP control surface.
    #[serde(default)]
    pub control: ControlConfig,
    /// Outbound messaging API.
    #[serde(default)]
    pub delivery: HttpDeliveryConfig,
    /// Initial dispatch configuration; changed at runtime via `configure`.
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_shutdown_timeout_ms() -> u64 {
    5_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            control: ControlConfig::default(),
            delivery: HttpDeliveryConfig::default(),
            dispatch: DispatchConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the initial dispatch configuration against runtime limits.
    pub fn validate(&self) -> AppResult<()> {
        let delay_ms = i64::try_from(self.dispatch.delay_ms).unwrap_or(i64::MAX);
        ConfigPatch {
            delay_ms: Some(delay_ms),
            prefix: Some(self.dispatch.prefix.clone()),
            display_name: Some(self.dispatch.display_name.clone()),
            failure_policy: Some(self.dispatch.failure_policy),
        }
        .validate()
        .map_err(|e| AppError::Config(format!("Invalid dispatch settings: {e}")))
    }
}
