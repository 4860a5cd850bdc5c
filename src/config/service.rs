use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::config::settings::SettingsConfig;

pub const VENDOR_TIMEOUT_MS_DEFAULT: u64 = 15_000;
pub const DB_ACQUIRE_TIMEOUT_MS_DEFAULT: u64 = 5_000;
pub const DB_MAX_CONNECTIONS_DEFAULT: u32 = 5;

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub settings: SettingsConfig,
    /// token store backing; in-memory when omitted
    pub database: Option<DatabaseConfig>,
    pub vendor: VendorConfig,
    pub login: LoginConfig,
}

/// ================================
/// Token store
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// postgres://... or sqlite://...
    pub url: String,
    pub max_connections: Option<u32>,
    pub acquire_timeout_ms: Option<u64>,
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms.unwrap_or(DB_ACQUIRE_TIMEOUT_MS_DEFAULT))
    }
}

/// ================================
/// Vendor cabinet API
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct VendorConfig {
    pub base_url: String,
    #[serde(default = "default_cabinet_path")]
    pub cabinet_path: String,
    #[serde(default = "default_command_path")]
    pub command_path: String,
    /// static `Referer` header expected by the vendor backend
    pub referer: String,
    /// static `oid` header (operator id)
    pub oid: String,
    #[serde(default = "default_command_sign")]
    pub command_sign: String,
    #[serde(default = "default_sequence")]
    pub sequence: u32,
    pub timeout_ms: Option<u64>,
}

impl VendorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(VENDOR_TIMEOUT_MS_DEFAULT))
    }

    pub fn cabinet_url(&self) -> String {
        join_url(&self.base_url, &self.cabinet_path)
    }

    pub fn command_url(&self) -> String {
        join_url(&self.base_url, &self.command_path)
    }
}

/// ================================
/// Login strategies
/// ================================
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoginConfig {
    /// Run an external login program (browser automation) and read
    /// `{"success": bool, "token": "..."}` from its stdout.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        username: String,
        password: String,
        solver_api_key: String,
        #[serde(default)]
        env: HashMap<String, String>,
    },
    /// GET a token endpoint answering with the same JSON shape.
    Http {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

fn default_cabinet_path() -> String {
    "/api/cabinet".to_string()
}

fn default_command_path() -> String {
    "/api/command/sendCommandBySign".to_string()
}

fn default_command_sign() -> String {
    "SendCompulsoryBorrowDevice".to_string()
}

fn default_sequence() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_joined_without_double_slashes() {
        let vendor = VendorConfig {
            base_url: "https://backend.example.test/".to_string(),
            cabinet_path: "/api/cabinet".to_string(),
            command_path: "api/command/sendCommandBySign".to_string(),
            referer: "https://backend.example.test/device/list".to_string(),
            oid: "1".to_string(),
            command_sign: default_command_sign(),
            sequence: 1,
            timeout_ms: None,
        };
        assert_eq!(vendor.cabinet_url(), "https://backend.example.test/api/cabinet");
        assert_eq!(vendor.command_url(), "https://backend.example.test/api/command/sendCommandBySign");
        assert_eq!(vendor.timeout(), Duration::from_millis(VENDOR_TIMEOUT_MS_DEFAULT));
    }

    #[test]
    fn login_config_is_tagged_by_type() {
        let yaml = r#"
type: http
url: http://127.0.0.1:9000/token
"#;
        let login: LoginConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(login, LoginConfig::Http { ref url, .. } if url == "http://127.0.0.1:9000/token"));
    }
}
