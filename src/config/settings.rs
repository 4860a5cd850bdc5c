use std::time::Duration;

use serde::Deserialize;

pub const GRACE_WINDOW_MS_DEFAULT: u64 = 2_000;
pub const LOGIN_TIMEOUT_MS_DEFAULT: u64 = 90_000;

/// ================================
/// Global service-wide settings
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct SettingsConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    pub logging: Option<LoggingConfig>,
    pub refresh: Option<RefreshConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RefreshConfig {
    /// how long a finished refresh keeps being handed out to late callers
    pub grace_window_ms: Option<u64>,
    /// upper bound for one login attempt
    pub login_timeout_ms: Option<u64>,
}

impl RefreshConfig {
    pub fn grace_window(&self) -> Duration {
        Duration::from_millis(self.grace_window_ms.unwrap_or(GRACE_WINDOW_MS_DEFAULT))
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_millis(self.login_timeout_ms.unwrap_or(LOGIN_TIMEOUT_MS_DEFAULT))
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            grace_window_ms: Some(GRACE_WINDOW_MS_DEFAULT),
            login_timeout_ms: Some(LOGIN_TIMEOUT_MS_DEFAULT),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_path")]
    pub path: String,
    #[serde(default)]
    pub is_enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            path: default_metrics_path(),
            is_enabled: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: String
}

/// ================================
/// Logging
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String, // allowed: trace, debug, info, warn, error
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn new (level: String, format: LogFormat) -> Self {
        Self { level, format }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}
