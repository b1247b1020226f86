//! Server error types.

use std::fmt;

use bucket_gate_access::ConfigError;

/// Errors from building the gate context on first use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    /// The gate settings are invalid.
    Config(ConfigError),
    /// The configured bucket cannot be read.
    Store { details: String },
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "invalid configuration: {e}"),
            Self::Store { details } => write!(f, "object store unavailable: {details}"),
        }
    }
}

impl std::error::Error for InitError {}

impl From<ConfigError> for InitError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Errors from constructing the identity provider HTTP client.
#[derive(Debug)]
pub enum HttpClientError {
    /// The client could not be built.
    Build(String),
}

impl fmt::Display for HttpClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Build(msg) => write!(f, "failed to create HTTP client: {msg}"),
        }
    }
}

impl std::error::Error for HttpClientError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_error_wraps_config_error() {
        let err: InitError = ConfigError::MissingSetting { key: "BucketName" }.into();
        assert!(err.to_string().contains("invalid configuration"));
        assert!(err.to_string().contains("BucketName"));
    }

    #[test]
    fn init_error_store_display() {
        let err = InitError::Store {
            details: "bucket 'site' does not exist".to_string(),
        };
        assert!(err.to_string().contains("object store unavailable"));
    }
}
