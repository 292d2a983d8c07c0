//! Configuration Module
//!
//! Idempotency settings (routes, TTLs, headers) loaded from a JSON document,
//! and server settings for the demo binary loaded from environment variables.
//!
//! The lock TTL equals the cache TTL of the matched route. It must be longer
//! than the slowest handler on that route: once a lock expires a second
//! request with the same key can start executing while the first is still
//! running.

use std::env;
use std::path::Path;
use std::time::Duration;

use axum::http::{HeaderName, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;
use crate::policy::RouteRule;
use crate::storage::DEFAULT_NAMESPACE;

/// TTL in seconds used when neither the route nor the config sets one.
pub const DEFAULT_EXPIRE_TIME: u64 = 3600;

/// Header carrying the client's idempotency key.
pub const DEFAULT_KEY_HEADER: &str = "Idempotency-Key";

/// Header added to replayed responses.
pub const DEFAULT_REPLAYED_HEADER: &str = "Idempotency-Replayed";

/// Status of the concurrent-request rejection.
pub const DEFAULT_CONCURRENT_STATUS: u16 = 429;

// == Lock Failure Policy ==
/// What to do when the lock cannot be taken because storage is down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockFailurePolicy {
    /// Run the handler without exclusivity and flag it in diagnostics.
    #[default]
    FailOpen,
    /// Reject the request with 503.
    FailClosed,
}

// == Route Config ==
/// One entry of the `routes` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Literal path or a path with `*` single-segment wildcards
    pub path: String,
    pub http_method: String,
    /// Cache and lock TTL in seconds for this route
    #[serde(default)]
    pub expire_time: Option<u64>,
}

impl RouteConfig {
    pub fn new(path: impl Into<String>, http_method: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            http_method: http_method.into(),
            expire_time: None,
        }
    }

    pub fn with_expire_time(mut self, seconds: u64) -> Self {
        self.expire_time = Some(seconds);
        self
    }
}

// == Idempotency Config ==
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdempotencyConfig {
    /// Default TTL in seconds for routes without their own
    pub expire_time: Option<u64>,
    pub concurrent_response_status: u16,
    pub replayed_response_header: String,
    /// Request header holding the idempotency key
    pub header: String,
    /// Prefix for every storage key
    pub namespace: String,
    pub lock_failure: LockFailurePolicy,
    /// Ordered; the first matching rule wins
    pub routes: Vec<RouteConfig>,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            expire_time: None,
            concurrent_response_status: DEFAULT_CONCURRENT_STATUS,
            replayed_response_header: DEFAULT_REPLAYED_HEADER.to_string(),
            header: DEFAULT_KEY_HEADER.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            lock_failure: LockFailurePolicy::default(),
            routes: Vec::new(),
        }
    }
}

impl IdempotencyConfig {
    // == Loading ==
    /// Reads a JSON config file.
    ///
    /// The document is either a config object or a map of environment
    /// sections (`{"default": {..}, "production": {..}}`). The section named
    /// `environment` is used, falling back to `default`, then to the document
    /// itself.
    pub fn from_file(path: impl AsRef<Path>, environment: &str) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw, environment)
    }

    pub fn from_json(raw: &str, environment: &str) -> Result<Self, ConfigError> {
        let document: Value = serde_json::from_str(raw)?;
        let section = match document.get(environment).or_else(|| document.get("default")) {
            Some(section) if section.is_object() => section.clone(),
            _ => document,
        };

        let config: Self = serde_json::from_value(section)?;
        config.validate()?;
        Ok(config)
    }

    // == Validation ==
    /// Checks every field that would otherwise fail per request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.concurrent_status()?;
        self.key_header()?;
        self.replayed_header()?;
        self.route_rules()?;
        Ok(())
    }

    // == Typed Accessors ==
    /// Configured default TTL, or the hard fallback.
    pub fn default_expire_time(&self) -> Duration {
        Duration::from_secs(self.expire_time.unwrap_or(DEFAULT_EXPIRE_TIME))
    }

    pub fn concurrent_status(&self) -> Result<StatusCode, ConfigError> {
        StatusCode::from_u16(self.concurrent_response_status)
            .map_err(|_| ConfigError::InvalidStatus(self.concurrent_response_status))
    }

    pub fn key_header(&self) -> Result<HeaderName, ConfigError> {
        parse_header_name(&self.header)
    }

    pub fn replayed_header(&self) -> Result<HeaderName, ConfigError> {
        parse_header_name(&self.replayed_response_header)
    }

    /// Compiles the route list, preserving order.
    pub fn route_rules(&self) -> Result<Vec<RouteRule>, ConfigError> {
        self.routes
            .iter()
            .enumerate()
            .map(|(index, route)| RouteRule::from_config(index, route))
            .collect()
    }
}

fn parse_header_name(name: &str) -> Result<HeaderName, ConfigError> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|_| ConfigError::InvalidHeader(name.to_string()))
}

// == Server Config ==
/// Demo server parameters, all configurable via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP server port
    pub server_port: u16,
    /// Path to the idempotency JSON config
    pub config_path: Option<String>,
    /// Environment section to read from the config file
    pub app_env: String,
    /// Redis URL; in-memory storage is used when absent
    pub redis_url: Option<String>,
    /// Background cleanup interval in seconds (in-memory storage only)
    pub cleanup_interval: u64,
}

impl ServerConfig {
    /// Creates a new ServerConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `IDEMPOTENCY_CONFIG` - Path to the JSON config (default: none)
    /// - `APP_ENV` - Config section to use (default: "default")
    /// - `REDIS_URL` - Redis connection URL (default: none)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 1)
    pub fn from_env() -> Self {
        Self {
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            config_path: non_empty_var("IDEMPOTENCY_CONFIG"),
            app_env: non_empty_var("APP_ENV").unwrap_or_else(|| "default".to_string()),
            redis_url: non_empty_var("REDIS_URL"),
            cleanup_interval: env::var("CLEANUP_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_port: 3000,
            config_path: None,
            app_env: "default".to_string(),
            redis_url: None,
            cleanup_interval: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotency_config_default() {
        let config = IdempotencyConfig::default();
        assert_eq!(config.concurrent_response_status, 429);
        assert_eq!(config.replayed_response_header, "Idempotency-Replayed");
        assert_eq!(config.header, "Idempotency-Key");
        assert_eq!(config.default_expire_time(), Duration::from_secs(3600));
        assert_eq!(config.lock_failure, LockFailurePolicy::FailOpen);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_flat_document() {
        let raw = r#"{
            "expire_time": 600,
            "concurrent_response_status": 409,
            "routes": [{"path": "/orders", "http_method": "POST", "expire_time": 180}]
        }"#;
        let config = IdempotencyConfig::from_json(raw, "production").unwrap();

        assert_eq!(config.default_expire_time(), Duration::from_secs(600));
        assert_eq!(config.concurrent_status().unwrap(), StatusCode::CONFLICT);
        assert_eq!(config.routes, vec![RouteConfig::new("/orders", "POST").with_expire_time(180)]);
    }

    #[test]
    fn test_from_json_selects_environment_section() {
        let raw = r#"{
            "default": {"expire_time": 100},
            "production": {"expire_time": 200, "lock_failure": "fail_closed"}
        }"#;

        let production = IdempotencyConfig::from_json(raw, "production").unwrap();
        assert_eq!(production.expire_time, Some(200));
        assert_eq!(production.lock_failure, LockFailurePolicy::FailClosed);

        let staging = IdempotencyConfig::from_json(raw, "staging").unwrap();
        assert_eq!(staging.expire_time, Some(100));
    }

    #[test]
    fn test_from_json_rejects_invalid_route() {
        let raw = r#"{"routes": [{"path": "", "http_method": "POST"}]}"#;
        let result = IdempotencyConfig::from_json(raw, "default");
        assert!(matches!(result, Err(ConfigError::InvalidRoute { index: 0, .. })));
    }

    #[test]
    fn test_from_json_rejects_missing_method() {
        let raw = r#"{"routes": [{"path": "/orders"}]}"#;
        assert!(matches!(
            IdempotencyConfig::from_json(raw, "default"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_from_json_rejects_lowercase_method() {
        let raw = r#"{"routes": [
            {"path": "/orders", "http_method": "POST"},
            {"path": "/payments", "http_method": "post"}
        ]}"#;
        assert!(matches!(
            IdempotencyConfig::from_json(raw, "default"),
            Err(ConfigError::InvalidRoute {
                index: 1,
                reason: crate::error::RouteError::InvalidMethod(_)
            })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_status_and_header() {
        let config = IdempotencyConfig {
            concurrent_response_status: 42,
            ..IdempotencyConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidStatus(42))));

        let config = IdempotencyConfig {
            header: "bad header".to_string(),
            ..IdempotencyConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidHeader(_))));
    }

    #[test]
    fn test_from_file_missing() {
        let result = IdempotencyConfig::from_file("/nonexistent/idempotent.json", "default");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.app_env, "default");
        assert!(config.redis_url.is_none());
        assert_eq!(config.cleanup_interval, 1);
    }

    #[test]
    fn test_server_config_from_env_defaults() {
        env::remove_var("SERVER_PORT");
        env::remove_var("IDEMPOTENCY_CONFIG");
        env::remove_var("APP_ENV");
        env::remove_var("REDIS_URL");
        env::remove_var("CLEANUP_INTERVAL");

        let config = ServerConfig::from_env();
        assert_eq!(config.server_port, 3000);
        assert!(config.config_path.is_none());
        assert_eq!(config.app_env, "default");
        assert_eq!(config.cleanup_interval, 1);
    }
}
