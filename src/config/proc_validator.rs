//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - Validates:
//!   * server / metrics / logging settings
//!   * refresh grace window and login timeout bounds
//!   * vendor endpoint and static header presence
//!   * login strategy completeness
//!   * database url scheme

use tracing::{error, info};

use crate::config::service::{DatabaseConfig, LoginConfig, ServiceConfig, VendorConfig};
use crate::config::settings::{RefreshConfig, SettingsConfig};
use crate::observability::metrics::get_metrics;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const MAX_GRACE_WINDOW_MS: u64 = 60_000;
const RESERVED_PATHS: [&str; 2] = ["/health", "/token"];
const RESERVED_PREFIXES: [&str; 2] = ["/stations", "/pop"];

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub async fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_vendor(&cfg.vendor, &mut errors);
    validate_login(&cfg.login, &mut errors);
    if let Some(database) = &cfg.database {
        validate_database(database, &mut errors);
    }

    if errors.is_empty() {
        info!("config valid");
        Ok(())
    } else {
        error!("configuration validation errors ({}):", errors.len());
        for e in &errors {
            error!(" - {}", e);
        }
        get_metrics().await.config_validation_errors.inc();
        Err(errors)
    }
}

/// Exact service routes, or anything under the station route trees.
fn collides_with_service_route(path: &str) -> bool {
    let path = path.trim_end_matches('/');
    RESERVED_PATHS.contains(&path)
        || RESERVED_PREFIXES
            .iter()
            .any(|prefix| path == *prefix || path.starts_with(&format!("{}/", prefix)))
}

/// SETTINGS VALIDATION
fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if settings.server.host.is_empty() {
        errors.push(format!(
            "settings.server.host '{}' must be valid",
            settings.server.host
        ));
    }
    if settings.server.port.parse::<u16>().is_err() {
        errors.push(format!(
            "settings.server.port '{}' must be an integer in range 0-65535",
            settings.server.port
        ));
    }

    // metrics endpoint start with '/'
    let metrics = &settings.metrics;
    if !metrics.path.starts_with('/') {
        errors.push(format!(
            "settings.metrics.path '{}' must start with '/'",
            metrics.path
        ));
    }
    if metrics.is_enabled && collides_with_service_route(&metrics.path) {
        errors.push(format!(
            "settings.metrics.path '{}' collides with a service route",
            metrics.path
        ));
    }

    if let Some(logging) = &settings.logging {
        if !LOG_LEVELS.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' must be one of {:?}",
                logging.level, LOG_LEVELS
            ));
        }
    }

    if let Some(refresh) = &settings.refresh {
        validate_refresh(refresh, errors);
    }
}

fn validate_refresh(refresh: &RefreshConfig, errors: &mut Vec<String>) {
    if let Some(grace) = refresh.grace_window_ms {
        if grace > MAX_GRACE_WINDOW_MS {
            errors.push(format!(
                "settings.refresh.grace_window_ms ({}) must not exceed {}",
                grace, MAX_GRACE_WINDOW_MS
            ));
        }
    }
    if refresh.login_timeout_ms == Some(0) {
        errors.push("settings.refresh.login_timeout_ms must be > 0".to_string());
    }
}

/// VENDOR VALIDATION
fn validate_vendor(vendor: &VendorConfig, errors: &mut Vec<String>) {
    if !(vendor.base_url.starts_with("http://") || vendor.base_url.starts_with("https://")) {
        errors.push(format!(
            "vendor.base_url '{}' must start with http:// or https://",
            vendor.base_url
        ));
    }
    if vendor.referer.trim().is_empty() {
        errors.push("vendor.referer must not be empty".to_string());
    }
    if vendor.oid.trim().is_empty() {
        errors.push("vendor.oid must not be empty".to_string());
    }
    if vendor.command_sign.trim().is_empty() {
        errors.push("vendor.command_sign must not be empty".to_string());
    }
    if vendor.timeout_ms == Some(0) {
        errors.push("vendor.timeout_ms must be > 0".to_string());
    }
}

/// LOGIN VALIDATION
fn validate_login(login: &LoginConfig, errors: &mut Vec<String>) {
    match login {
        LoginConfig::Command {
            program,
            username,
            password,
            solver_api_key,
            ..
        } => {
            if program.trim().is_empty() {
                errors.push("login.program must not be empty".to_string());
            }
            for (field, value) in [
                ("username", username),
                ("password", password),
                ("solver_api_key", solver_api_key),
            ] {
                if value.trim().is_empty() {
                    errors.push(format!("login.{} is required for type 'command'", field));
                }
            }
        }
        LoginConfig::Http { url, .. } => {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(format!(
                    "login.url '{}' must start with http:// or https://",
                    url
                ));
            }
        }
    }
}

/// DATABASE VALIDATION
fn validate_database(database: &DatabaseConfig, errors: &mut Vec<String>) {
    let supported = ["postgres://", "postgresql://", "sqlite:"];
    if !supported.iter().any(|scheme| database.url.starts_with(scheme)) {
        errors.push(format!(
            "database.url must use one of {:?}",
            supported
        ));
    }
    if database.max_connections == Some(0) {
        errors.push("database.max_connections must be > 0".to_string());
    }
}
