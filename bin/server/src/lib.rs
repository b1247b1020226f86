//! bucket-gate server.
//!
//! Serves objects from a bucket over HTTP, sending browsers through an
//! OAuth2 login before anything under a protected prefix is returned.

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;
use tracing::warn;

pub use state::{AppState, GateContext};

/// Builds the application router.
///
/// Every path goes through the gate, except the diagnostics path when one
/// is configured.
pub fn app(state: Arc<AppState>) -> Router {
    let mut router = Router::new();

    if let Some(path) = state.config().diagnostics_path.as_deref() {
        if config::is_literal_route(path) {
            router = router.route(path, get(handler::diagnostics));
        } else {
            warn!(%path, "Ignoring diagnostics path that is not a literal route");
        }
    }

    router
        .fallback(handler::gate)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
