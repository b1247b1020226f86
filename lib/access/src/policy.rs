//! Access policy: which paths are protected and by which identity provider.
//!
//! The policy is validated once from a raw `string -> string` settings map
//! and is immutable afterwards. Settings keys are case-sensitive:
//!
//! | key | required |
//! |---|---|
//! | `BucketName` | always |
//! | `Region` | no (the caller falls back to its ambient region) |
//! | `ProtectedPaths` | no (comma-separated path prefixes) |
//! | `IDCSURL`, `ClientID`, `ClientSecret` | when `ProtectedPaths` is non-empty |
//! | `ProtectedPathMatching` | no (`first` or `any`, default `first`) |

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, info};
use url::Url;

use crate::error::ConfigError;

/// Settings key for the bucket holding served objects.
pub const BUCKET_NAME: &str = "BucketName";
/// Settings key for the bucket's region.
pub const REGION: &str = "Region";
/// Settings key for the comma-separated protected path prefixes.
pub const PROTECTED_PATHS: &str = "ProtectedPaths";
/// Settings key for the identity provider base URL.
pub const IDENTITY_PROVIDER_URL: &str = "IDCSURL";
/// Settings key for the OAuth2 client ID.
pub const CLIENT_ID: &str = "ClientID";
/// Settings key for the OAuth2 client secret.
pub const CLIENT_SECRET: &str = "ClientSecret";
/// Settings key for the protected path matching mode.
pub const PROTECTED_PATH_MATCHING: &str = "ProtectedPathMatching";

/// Every settings key the gate reads.
pub const SETTINGS_KEYS: &[&str] = &[
    BUCKET_NAME,
    REGION,
    PROTECTED_PATHS,
    IDENTITY_PROVIDER_URL,
    CLIENT_ID,
    CLIENT_SECRET,
    PROTECTED_PATH_MATCHING,
];

const AUTHORIZE_ENDPOINT: &str = "/oauth2/v1/authorize";
const TOKEN_ENDPOINT: &str = "/oauth2/v1/token";

/// How a request path is checked against the protected prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Only the first configured prefix is ever consulted.
    ///
    /// Paths matching only a later prefix are served without a session.
    /// Deployments that relied on this behaviour keep it by default.
    #[default]
    FirstPrefixOnly,
    /// Every configured prefix is consulted.
    AnyPrefix,
}

impl MatchMode {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "first" => Ok(Self::FirstPrefixOnly),
            "any" => Ok(Self::AnyPrefix),
            other => Err(ConfigError::InvalidMatchingMode {
                value: other.to_string(),
            }),
        }
    }

    /// Returns the settings value naming this mode.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstPrefixOnly => "first",
            Self::AnyPrefix => "any",
        }
    }
}

/// OAuth2 client settings for the identity provider guarding protected paths.
#[derive(Clone, PartialEq, Eq)]
pub struct IdentityProvider {
    base_url: Url,
    authorize_url: Url,
    token_url: Url,
    client_id: String,
    client_secret: String,
}

impl IdentityProvider {
    /// Creates provider settings, deriving the authorize and token endpoints
    /// from `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidProviderUrl` if `base_url` is not an
    /// absolute URL with a host.
    pub fn new(
        base_url: &str,
        client_id: String,
        client_secret: String,
    ) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidProviderUrl {
            url: base_url.to_string(),
            reason,
        };

        let base = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
        if !base.has_host() {
            return Err(invalid("URL has no host".to_string()));
        }

        let authorize_url = base
            .join(AUTHORIZE_ENDPOINT)
            .map_err(|e| invalid(e.to_string()))?;
        let token_url = base
            .join(TOKEN_ENDPOINT)
            .map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            base_url: base,
            authorize_url,
            token_url,
            client_id,
            client_secret,
        })
    }

    /// Returns the identity provider base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the authorization endpoint.
    #[must_use]
    pub fn authorize_url(&self) -> &Url {
        &self.authorize_url
    }

    /// Returns the token endpoint.
    #[must_use]
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    /// Returns the OAuth2 client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the OAuth2 client secret.
    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }
}

impl fmt::Debug for IdentityProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityProvider")
            .field("base_url", &self.base_url.as_str())
            .field("authorize_url", &self.authorize_url.as_str())
            .field("token_url", &self.token_url.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Validated protection policy for one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPolicy {
    bucket_name: String,
    region: Option<String>,
    protected_prefixes: Vec<String>,
    matching: MatchMode,
    identity_provider: Option<IdentityProvider>,
}

impl AccessPolicy {
    /// Creates a policy that protects nothing.
    #[must_use]
    pub fn unprotected(bucket_name: String, region: Option<String>) -> Self {
        Self {
            bucket_name,
            region,
            protected_prefixes: Vec::new(),
            matching: MatchMode::default(),
            identity_provider: None,
        }
    }

    /// Creates a policy guarding `protected_prefixes` with `identity_provider`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidProtectedPath` if a prefix does not begin
    /// with `/`.
    pub fn protected(
        bucket_name: String,
        region: Option<String>,
        protected_prefixes: Vec<String>,
        matching: MatchMode,
        identity_provider: IdentityProvider,
    ) -> Result<Self, ConfigError> {
        if let Some(bad) = protected_prefixes.iter().find(|p| !p.starts_with('/')) {
            return Err(ConfigError::InvalidProtectedPath { path: bad.clone() });
        }

        let identity_provider = (!protected_prefixes.is_empty()).then_some(identity_provider);

        Ok(Self {
            bucket_name,
            region,
            protected_prefixes,
            matching,
            identity_provider,
        })
    }

    /// Validates a raw settings map into a policy.
    ///
    /// No network calls are made; the identity provider URL is only checked
    /// syntactically.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` describing the first invalid setting.
    pub fn from_settings(settings: &HashMap<String, String>) -> Result<Self, ConfigError> {
        debug!("Processing gate settings");

        let bucket_name = required(settings, BUCKET_NAME)?;
        info!(bucket = %bucket_name, "Bucket name set");

        let region = optional(settings, REGION);
        match &region {
            Some(region) => info!(%region, "Region for bucket set"),
            None => debug!("No region setting, the ambient region will be used"),
        }

        let Some(raw_paths) = optional(settings, PROTECTED_PATHS) else {
            debug!("No protected paths");
            return Ok(Self::unprotected(bucket_name, region));
        };

        let protected_prefixes: Vec<String> = raw_paths.split(',').map(str::to_string).collect();
        for path in &protected_prefixes {
            if !path.starts_with('/') {
                return Err(ConfigError::InvalidProtectedPath { path: path.clone() });
            }
        }
        debug!(count = protected_prefixes.len(), "Protected paths configured");

        let matching = match optional(settings, PROTECTED_PATH_MATCHING) {
            Some(value) => MatchMode::parse(&value)?,
            None => MatchMode::default(),
        };

        let base_url = required(settings, IDENTITY_PROVIDER_URL)?;
        let client_id = required(settings, CLIENT_ID)?;
        let client_secret = required(settings, CLIENT_SECRET)?;

        let provider = IdentityProvider::new(&base_url, client_id, client_secret)?;
        info!(
            provider = %provider.base_url(),
            client_id = %provider.client_id(),
            matching = matching.as_str(),
            "Identity provider configured"
        );
        debug!(
            authorize_url = %provider.authorize_url(),
            token_url = %provider.token_url(),
            "Derived identity provider endpoints"
        );

        Self::protected(bucket_name, region, protected_prefixes, matching, provider)
    }

    /// Returns the bucket name.
    #[must_use]
    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    /// Returns the configured region, if any.
    #[must_use]
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Returns the protected path prefixes in configured order.
    #[must_use]
    pub fn protected_prefixes(&self) -> &[String] {
        &self.protected_prefixes
    }

    /// Returns true if any path prefix is protected.
    #[must_use]
    pub fn has_protection(&self) -> bool {
        !self.protected_prefixes.is_empty()
    }

    /// Returns the protected path matching mode.
    #[must_use]
    pub fn matching(&self) -> MatchMode {
        self.matching
    }

    /// Returns the identity provider, present iff a path is protected.
    #[must_use]
    pub fn identity_provider(&self) -> Option<&IdentityProvider> {
        self.identity_provider.as_ref()
    }
}

fn optional(settings: &HashMap<String, String>, key: &str) -> Option<String> {
    settings.get(key).filter(|v| !v.is_empty()).cloned()
}

fn required(settings: &HashMap<String, String>, key: &'static str) -> Result<String, ConfigError> {
    optional(settings, key).ok_or(ConfigError::MissingSetting { key })
}
