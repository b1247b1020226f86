use std::sync::Arc;
use std::time::Duration;

use bucket_gate_server::{
    AppState, app,
    auth::HttpTokenEndpoint,
    config::{EnvSettings, ServerConfig},
};
use bucket_gate_store::FilesystemStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!(
        storage_root = %config.storage_root.display(),
        "Loaded configuration"
    );

    let endpoint = HttpTokenEndpoint::new(Duration::from_secs(config.token_timeout_seconds))
        .expect("failed to create token endpoint client");
    let store = FilesystemStore::new(config.storage_root.clone());

    // Gate settings are read and validated on the first request
    let addr = config.listen_addr.clone();
    let app_state = Arc::new(AppState::new(
        config,
        Arc::new(EnvSettings),
        Arc::new(store),
        Arc::new(endpoint),
    ));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", addr);

    axum::serve(listener, app(app_state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
