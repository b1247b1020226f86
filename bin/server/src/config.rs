//! Centralized server configuration.
//!
//! Two kinds of settings drive the server:
//! - [`ServerConfig`]: how the process runs (listen address, storage root,
//!   timeouts), loaded via the `config` crate from `GATE_*` environment
//!   variables.
//! - Gate settings: the case-sensitive keys validated into an
//!   [`AccessPolicy`](bucket_gate_access::AccessPolicy), read through a
//!   [`SettingsSource`] on first use rather than at startup.

use std::collections::HashMap;
use std::path::PathBuf;

use bucket_gate_access::policy::SETTINGS_KEYS;
use serde::Deserialize;

/// Process configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Directory holding one sub-directory per bucket.
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,

    /// Region assumed when the gate settings name none.
    #[serde(default = "default_region")]
    pub default_region: String,

    /// Upper bound on the token exchange request, in seconds.
    #[serde(default = "default_token_timeout_seconds")]
    pub token_timeout_seconds: u64,

    /// Scheme of the callback URL handed to the identity provider.
    /// The gateway normally sits behind TLS termination, hence `https`.
    #[serde(default = "default_callback_scheme")]
    pub callback_scheme: String,

    /// Path answering with a plain-text configuration report. Disabled when unset.
    #[serde(default)]
    pub diagnostics_path: Option<String>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./buckets")
}

fn default_region() -> String {
    "local".to_string()
}

fn default_token_timeout_seconds() -> u64 {
    10
}

fn default_callback_scheme() -> String {
    "https".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            storage_root: default_storage_root(),
            default_region: default_region(),
            token_timeout_seconds: default_token_timeout_seconds(),
            callback_scheme: default_callback_scheme(),
            diagnostics_path: None,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from `GATE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be parsed, or
    /// if the result fails [`ServerConfig::validate`].
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let config: Self = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("GATE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Checks values the router would otherwise reject at startup.
    ///
    /// # Errors
    ///
    /// Returns an error if `diagnostics_path` is not a plain literal path.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        match self.diagnostics_path.as_deref() {
            Some(path) if !is_literal_route(path) => Err(config::ConfigError::Message(format!(
                "diagnostics_path '{path}' must start with '/' and contain only letters, digits, '/', '-', '_', '.' or '~'"
            ))),
            _ => Ok(()),
        }
    }
}

/// Returns true if `path` can be routed as a literal, without captures or wildcards.
#[must_use]
pub fn is_literal_route(path: &str) -> bool {
    path.starts_with('/')
        && path
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'/' | b'-' | b'_' | b'.' | b'~'))
}

/// Supplies the raw gate settings.
///
/// Called on every initialisation attempt, so a corrected setting is picked
/// up by the next request after a failed one.
pub trait SettingsSource: Send + Sync {
    /// Returns the settings currently in effect.
    fn load(&self) -> HashMap<String, String>;
}

/// Reads gate settings from environment variables named exactly like the keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSettings;

impl SettingsSource for EnvSettings {
    fn load(&self) -> HashMap<String, String> {
        SETTINGS_KEYS
            .iter()
            .filter_map(|key| {
                std::env::var(key)
                    .ok()
                    .map(|value| ((*key).to_string(), value))
            })
            .collect()
    }
}

/// A fixed set of gate settings.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings(HashMap<String, String>);

impl StaticSettings {
    /// Creates settings from key/value pairs.
    #[must_use]
    pub fn new<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

impl SettingsSource for StaticSettings {
    fn load(&self) -> HashMap<String, String> {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_has_correct_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.storage_root, PathBuf::from("./buckets"));
        assert_eq!(config.default_region, "local");
        assert_eq!(config.token_timeout_seconds, 10);
        assert_eq!(config.callback_scheme, "https");
        assert!(config.diagnostics_path.is_none());
    }

    #[test]
    fn literal_diagnostics_path_is_valid() {
        let config = ServerConfig {
            diagnostics_path: Some("/_gate/status-v1.txt".to_string()),
            ..ServerConfig::default()
        };
        assert!(config.validate().is_ok());
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn diagnostics_path_with_route_syntax_is_rejected() {
        for path in ["/{x}", "/a/*b", "/:id", "status", "", "/a b"] {
            let config = ServerConfig {
                diagnostics_path: Some(path.to_string()),
                ..ServerConfig::default()
            };
            assert!(config.validate().is_err(), "{path:?} should be rejected");
        }
    }

    #[test]
    fn static_settings_returns_pairs() {
        let settings = StaticSettings::new([("BucketName", "site"), ("Region", "eu")]);
        let loaded = settings.load();
        assert_eq!(loaded.get("BucketName").map(String::as_str), Some("site"));
        assert_eq!(loaded.len(), 2);
    }
}
