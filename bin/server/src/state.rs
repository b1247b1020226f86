//! Shared application state and lazy gate initialisation.

use std::sync::Arc;

use bucket_gate_access::{AccessPolicy, RequestRouter, TokenEndpoint};
use bucket_gate_store::ObjectStore;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::config::{ServerConfig, SettingsSource};
use crate::error::InitError;

/// Everything built from the gate settings on first use.
#[derive(Debug)]
pub struct GateContext {
    policy: AccessPolicy,
    region: String,
}

impl GateContext {
    /// Returns the validated access policy.
    #[must_use]
    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Returns the effective region, falling back to the server default.
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }
}

/// Shared application state.
pub struct AppState {
    config: ServerConfig,
    settings: Arc<dyn SettingsSource>,
    store: Arc<dyn ObjectStore>,
    router: RequestRouter,
    context: OnceCell<GateContext>,
}

impl AppState {
    /// Creates the state. Nothing is validated until the first request.
    pub fn new(
        config: ServerConfig,
        settings: Arc<dyn SettingsSource>,
        store: Arc<dyn ObjectStore>,
        endpoint: Arc<dyn TokenEndpoint>,
    ) -> Self {
        let router = RequestRouter::new(endpoint).with_callback_scheme(&config.callback_scheme);
        Self {
            config,
            settings,
            store,
            router,
            context: OnceCell::new(),
        }
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the object store.
    #[must_use]
    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    /// Returns the request router.
    #[must_use]
    pub fn router(&self) -> &RequestRouter {
        &self.router
    }

    /// Returns the gate context, building it on first call.
    ///
    /// Concurrent first callers wait on a single initialisation. A failure
    /// is not cached: the next call tries again with freshly loaded settings.
    ///
    /// # Errors
    ///
    /// Returns an `InitError` if the settings are invalid or the bucket
    /// cannot be reached.
    pub async fn context(&self) -> Result<&GateContext, InitError> {
        self.context.get_or_try_init(|| self.initialize()).await
    }

    async fn initialize(&self) -> Result<GateContext, InitError> {
        let settings = self.settings.load();

        let policy = AccessPolicy::from_settings(&settings).inspect_err(|e| {
            warn!(error = %e, "Gate settings rejected");
        })?;

        self.store
            .check_bucket(policy.bucket_name())
            .await
            .map_err(|report| {
                warn!(bucket = policy.bucket_name(), error = %report, "Bucket check failed");
                InitError::Store {
                    details: report.to_string(),
                }
            })?;

        let region = policy
            .region()
            .unwrap_or(&self.config.default_region)
            .to_string();

        info!(
            bucket = policy.bucket_name(),
            %region,
            protected = policy.has_protection(),
            "Gate initialised"
        );

        Ok(GateContext { policy, region })
    }
}
