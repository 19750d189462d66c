//! Server configuration.
//!
//! [`ServerConfig`] can be built in code, deserialized from JSON, or read from
//! `RADIX_HTTPD_*` environment variables. Every field has a default, so a
//! partial document or an empty environment is fine.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix of every environment variable read by [`ServerConfig::from_env`].
pub const ENV_PREFIX: &str = "RADIX_HTTPD_";

/// Errors produced while loading or validating a [`ServerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("environment variable {var} has unparsable value {value:?}")]
    Env { var: String, value: String },

    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Listener, pool and per-connection limits.
///
/// # Examples
///
/// ```
/// use radix_httpd::ServerConfig;
///
/// let config = ServerConfig::from_json(r#"{ "addr": "0.0.0.0:8080", "max_connections": 64 }"#).unwrap();
/// assert_eq!(config.addr, "0.0.0.0:8080");
/// assert_eq!(config.max_connections, 64);
/// assert_eq!(config.read_buffer_size, 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to listen on.
    pub addr: String,
    /// Connections served concurrently; further accepts wait for a free slot.
    pub max_connections: usize,
    /// Bytes requested from the socket per read.
    pub read_buffer_size: usize,
    /// Largest request line plus header block accepted, in bytes.
    pub max_head_size: usize,
    /// Idle time allowed between reads before answering `408`. `None` waits forever.
    pub read_timeout_ms: Option<u64>,
    /// How long shutdown waits for in-flight connections before aborting them.
    pub shutdown_grace_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:7788".to_owned(),
            max_connections: 4,
            read_buffer_size: 1024,
            max_head_size: crate::http::parser::DEFAULT_MAX_HEAD_SIZE,
            read_timeout_ms: None,
            shutdown_grace_ms: 5_000,
        }
    }
}

impl ServerConfig {
    /// Parses and validates a JSON document. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `RADIX_HTTPD_ADDR`, `RADIX_HTTPD_MAX_CONNECTIONS`, ... from the
    /// process environment, on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), resolving variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            let name = format!("{ENV_PREFIX}{suffix}");
            lookup(&name).map(|value| (name, value))
        };

        let mut config = Self::default();
        if let Some((_, addr)) = var("ADDR") {
            config.addr = addr;
        }
        if let Some((name, value)) = var("MAX_CONNECTIONS") {
            config.max_connections = parse_var(name, value)?;
        }
        if let Some((name, value)) = var("READ_BUFFER_SIZE") {
            config.read_buffer_size = parse_var(name, value)?;
        }
        if let Some((name, value)) = var("MAX_HEAD_SIZE") {
            config.max_head_size = parse_var(name, value)?;
        }
        if let Some((name, value)) = var("READ_TIMEOUT_MS") {
            config.read_timeout_ms = Some(parse_var(name, value)?);
        }
        if let Some((name, value)) = var("SHUTDOWN_GRACE_MS") {
            config.shutdown_grace_ms = parse_var(name, value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason| Err(ConfigError::Invalid { field, reason });

        if self.addr.trim().is_empty() {
            return invalid("addr", "must not be empty");
        }
        if self.max_connections == 0 {
            return invalid("max_connections", "must be at least 1");
        }
        if self.read_buffer_size == 0 {
            return invalid("read_buffer_size", "must be at least 1");
        }
        if self.max_head_size == 0 {
            return invalid("max_head_size", "must be at least 1");
        }
        if self.read_timeout_ms == Some(0) {
            return invalid("read_timeout_ms", "must be positive when set");
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

fn parse_var<T: std::str::FromStr>(var: String, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.addr, "127.0.0.1:7788");
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.max_head_size, 64 * 1024);
        assert_eq!(config.read_timeout(), None);
        assert_eq!(config.shutdown_grace(), Duration::from_secs(5));
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config = ServerConfig::from_json(r#"{ "read_timeout_ms": 250 }"#).unwrap();
        assert_eq!(config.read_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.addr, ServerConfig::default().addr);
    }

    #[test]
    fn json_rejects_unknown_fields_and_bad_values() {
        assert!(matches!(
            ServerConfig::from_json(r#"{ "port": 80 }"#),
            Err(ConfigError::Json(_))
        ));
        assert!(matches!(
            ServerConfig::from_json(r#"{ "max_connections": 0 }"#),
            Err(ConfigError::Invalid {
                field: "max_connections",
                ..
            })
        ));
    }

    #[test]
    fn env_overrides_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("RADIX_HTTPD_ADDR", "0.0.0.0:9000"),
            ("RADIX_HTTPD_MAX_CONNECTIONS", " 16 "),
            ("RADIX_HTTPD_READ_TIMEOUT_MS", "1500"),
        ]))
        .unwrap();
        assert_eq!(config.addr, "0.0.0.0:9000");
        assert_eq!(config.max_connections, 16);
        assert_eq!(config.read_timeout_ms, Some(1500));
        assert_eq!(config.read_buffer_size, 1024);
    }

    #[test]
    fn env_reports_the_offending_variable() {
        let err = ServerConfig::from_lookup(lookup(&[("RADIX_HTTPD_MAX_HEAD_SIZE", "big")]))
            .unwrap_err();
        match err {
            ConfigError::Env { var, value } => {
                assert_eq!(var, "RADIX_HTTPD_MAX_HEAD_SIZE");
                assert_eq!(value, "big");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = ServerConfig {
            read_timeout_ms: Some(0),
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
