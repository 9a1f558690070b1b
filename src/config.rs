//! Service configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! the base layer; a user config file (given with `--config`) is merged on top
//! key by key, then the result is deserialized and validated.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [server]
//! bind = "127.0.0.1:3000"     # Gateway listen address
//!
//! [fetch]
//! timeout_secs = 30           # Whole-request timeout for remote sources
//! connect_timeout_secs = 10   # TCP/TLS connect timeout
//! user_agent = "pixelpipe/0.1.0"
//! max_redirects = 20          # Redirects followed by default
//!
//! [logging]
//! filter = "info"             # tracing filter, overridden by RUST_LOG
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8080"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Service configuration loaded from `config.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// HTTP gateway settings.
    pub server: ServerConfig,
    /// Remote source fetching.
    pub fetch: FetchConfig,
    /// Log filtering.
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.socket_addr()?;
        if self.fetch.timeout_secs == 0 || self.fetch.connect_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "fetch timeouts must be non-zero".into(),
            ));
        }
        if self.fetch.user_agent.trim().is_empty() {
            return Err(ConfigError::Validation(
                "fetch.user_agent must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind.parse().map_err(|_| {
            ConfigError::Validation(format!("server.bind '{}' is not a socket address", self.bind))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: concat!("pixelpipe/", env!("CARGO_PKG_VERSION")).to_string(),
            max_redirects: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ServiceConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key by key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut table), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                let merged = match table.remove(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => value,
                };
                table.insert(key, merged);
            }
            toml::Value::Table(table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ServiceConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ServiceConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path`, or the stock defaults when none is given.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    let overlay = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            Some(toml::from_str::<toml::Value>(&content)?)
        }
        None => None,
    };
    resolve_config(stock_defaults_value(), overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> String {
    format!(
        r##"# pixelpipe Configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# HTTP gateway
# ---------------------------------------------------------------------------
[server]
# Address the gateway listens on.
bind = "127.0.0.1:3000"

# ---------------------------------------------------------------------------
# Remote sources
# ---------------------------------------------------------------------------
[fetch]
# Whole-request timeout in seconds. A per-request `timeout` option (ms) wins.
timeout_secs = 30

# Connection timeout in seconds.
connect_timeout_secs = 10

# User-Agent header sent with every request.
user_agent = "pixelpipe/{version}"

# Redirects followed when the request does not set `redirect` or `follow`.
max_redirects = 20

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
# tracing-subscriber filter directive. RUST_LOG takes precedence.
filter = "info"
"##,
        version = env!("CARGO_PKG_VERSION")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = ServiceConfig::default();
        assert_eq!(config.server.bind, "127.0.0.1:3000");
        assert_eq!(config.fetch.timeout_secs, 30);
        assert_eq!(config.fetch.max_redirects, 20);
        assert!(config.fetch.user_agent.starts_with("pixelpipe/"));
        assert_eq!(config.logging.filter, "info");
        config.validate().unwrap();
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[server]
bind = "0.0.0.0:8080"
"#;
        let config: ServiceConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        // Default values preserved
        assert_eq!(config.fetch.connect_timeout_secs, 10);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn stock_toml_matches_defaults() {
        let parsed: ServiceConfig = toml::from_str(&stock_config_toml()).unwrap();
        assert_eq!(parsed, ServiceConfig::default());
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let config = load_config(None).unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            r#"
[fetch]
timeout_secs = 5
user_agent = "tester"
"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.fetch.timeout_secs, 5);
        assert_eq!(config.fetch.user_agent, "tester");
        // Unspecified values should be defaults
        assert_eq!(config.fetch.max_redirects, 20);
        assert_eq!(config.server.bind, "127.0.0.1:3000");
    }

    #[test]
    fn load_config_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let result = load_config(Some(&tmp.path().join("absent.toml")));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "this is not valid toml [[[").unwrap();
        assert!(matches!(load_config(Some(&path)), Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str(r#"timeout_secs = 30"#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"timeout_secs = 5"#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("timeout_secs").unwrap().as_integer(), Some(5));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[fetch]
timeout_secs = 30
max_redirects = 20
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[fetch]
max_redirects = 3
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let fetch = merged.get("fetch").unwrap();
        assert_eq!(fetch.get("max_redirects").unwrap().as_integer(), Some(3));
        // timeout preserved from base
        assert_eq!(fetch.get("timeout_secs").unwrap().as_integer(), Some(30));
    }

    // =========================================================================
    // Validation and unknown key rejection
    // =========================================================================

    #[test]
    fn invalid_bind_rejected() {
        let overlay: toml::Value = toml::from_str(
            r#"
[server]
bind = "localhost"
"#,
        )
        .unwrap();
        let result = resolve_config(stock_defaults_value(), Some(overlay));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut config = ServiceConfig::default();
        config.fetch.connect_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn empty_user_agent_rejected() {
        let mut config = ServiceConfig::default();
        config.fetch.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_key_rejected() {
        let toml_str = r#"
[fetch]
timeout = 30
"#;
        let result: Result<ServiceConfig, _> = toml::from_str(toml_str);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_section_rejected() {
        let toml_str = r#"
[serverz]
bind = "127.0.0.1:1"
"#;
        let result: Result<ServiceConfig, _> = toml::from_str(toml_str);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_key_rejected_via_load_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            r#"
[logging]
level = "debug"
"#,
        )
        .unwrap();
        assert!(load_config(Some(&path)).is_err());
    }
}
