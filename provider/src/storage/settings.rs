//! Settings file management

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::filesys::file::File;
use crate::errors::ProviderError;
use crate::logs::LogLevel;
use crate::utils::CooldownOptions;

/// Provider settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Directory for log files; stderr only when absent
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Emit JSON logs
    #[serde(default)]
    pub json_logs: bool,

    /// Cloud API configuration
    #[serde(default)]
    pub api: ApiSettings,

    /// Convergence timeouts
    #[serde(default)]
    pub timeouts: TimeoutSettings,

    /// Poll backoff configuration
    #[serde(default)]
    pub polling: PollingSettings,

    /// API access token; `MZCLOUD_ACCESS_TOKEN` is used when unset
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,
}

impl Settings {
    /// Load settings from a JSON file, using defaults when the file is missing
    pub async fn load(file: &File) -> Result<Self, ProviderError> {
        if !file.exists().await {
            return Ok(Self::default());
        }
        file.read_json().await
    }
}

/// Cloud API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL for the cloud API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://cloud.materialize.com".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Convergence timeouts, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutSettings {
    #[serde(default = "default_operation_timeout")]
    pub create_secs: u64,

    #[serde(default = "default_operation_timeout")]
    pub update_secs: u64,

    #[serde(default = "default_operation_timeout")]
    pub delete_secs: u64,
}

fn default_operation_timeout() -> u64 {
    20 * 60
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            create_secs: default_operation_timeout(),
            update_secs: default_operation_timeout(),
            delete_secs: default_operation_timeout(),
        }
    }
}

/// Poll backoff settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingSettings {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter_factor() -> f64 {
    0.1
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter_factor: default_jitter_factor(),
        }
    }
}

impl PollingSettings {
    pub fn to_cooldown(&self) -> CooldownOptions {
        CooldownOptions {
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            multiplier: self.multiplier,
            jitter_factor: self.jitter_factor,
        }
    }
}
