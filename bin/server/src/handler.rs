//! HTTP handlers: the gate itself and the diagnostics report.

use std::fmt::Write as _;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CONTENT_TYPE, LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::Cookie;
use bucket_gate_access::{GateRequest, RouteDecision, SessionCookie};
use bucket_gate_store::ObjectStore;
use tracing::{debug, error, info, warn};

use crate::error::InitError;
use crate::state::{AppState, GateContext};

const PLAIN_TEXT: &str = "text/plain; charset=utf-8";

/// Handles every request not claimed by another route.
pub async fn gate(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let request = GateRequest {
        method: method.as_str(),
        path: uri.path(),
        query: uri.query(),
        headers: &headers,
    };

    let context = state.context().await;
    let decision = match &context {
        Ok(context) => state.router().route(Ok(context.policy()), &request).await,
        Err(InitError::Config(e)) => state.router().route(Err(e), &request).await,
        Err(e) => {
            error!(error = %e, "Gate unavailable");
            RouteDecision::ServerError(e.to_string())
        }
    };

    match (decision, &context) {
        (RouteDecision::ServeObject(key), Ok(context)) => {
            fetch_object(state.store(), context.policy().bucket_name(), &key).await
        }
        (decision, _) => render(decision),
    }
}

/// Reads an object and answers with it.
///
/// Every lookup failure answers 404, whatever its cause.
async fn fetch_object(store: &dyn ObjectStore, bucket: &str, key: &str) -> Response {
    match store.get(bucket, key).await {
        Ok(object) => {
            debug!(%bucket, %key, content_type = %object.content_type, "Serving object");
            (
                StatusCode::OK,
                [(CONTENT_TYPE, object.content_type)],
                object.content,
            )
                .into_response()
        }
        Err(report) => {
            if report.current_context().is_not_found() {
                info!(%bucket, %key, "Object not found");
            } else {
                warn!(%bucket, %key, error = %report, "Object lookup failed");
            }
            render(RouteDecision::NotFound)
        }
    }
}

/// Renders a decision that does not need the store.
fn render(decision: RouteDecision) -> Response {
    match decision {
        RouteDecision::RedirectToLogin(url) => found(url.as_str(), None),
        RouteDecision::RedirectFromCallback { location, session } => {
            found(&location, session.as_ref())
        }
        RouteDecision::ServerError(message) => server_error(&message),
        RouteDecision::ServeObject(_) | RouteDecision::NotFound => not_found(),
    }
}

fn found(location: &str, session: Option<&SessionCookie>) -> Response {
    let mut builder = Response::builder()
        .status(StatusCode::FOUND)
        .header(LOCATION, location);

    if let Some(session) = session {
        // Session values are already cookie-safe and must not be escaped again.
        let cookie = Cookie::build((session.name(), session.value()))
            .path(session.path())
            .build();
        builder = builder.header(SET_COOKIE, cookie.to_string());
    }

    match builder.body(Body::from("Page moved")) {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "Redirect is not a valid response");
            server_error("invalid redirect location")
        }
    }
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        [(CONTENT_TYPE, PLAIN_TEXT)],
        "File not found",
    )
        .into_response()
}

fn server_error(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(CONTENT_TYPE, PLAIN_TEXT)],
        format!("500 Server error\n{message}"),
    )
        .into_response()
}

/// Answers with a plain-text report of the gate configuration.
pub async fn diagnostics(State(state): State<Arc<AppState>>) -> Response {
    let report = match state.context().await {
        Ok(context) => describe_context(context),
        Err(e) => describe_failure(&e),
    };

    (StatusCode::OK, [(CONTENT_TYPE, PLAIN_TEXT)], report).into_response()
}

fn describe_context(context: &GateContext) -> String {
    let policy = context.policy();
    let mut report = String::new();

    let _ = writeln!(report, "Configuration OK: true");
    let _ = writeln!(report, "Bucket Name: {}", policy.bucket_name());
    let _ = writeln!(report, "Region: {}", context.region());
    let _ = writeln!(
        report,
        "Protected Paths: {}",
        policy.protected_prefixes().join(",")
    );
    let _ = writeln!(report, "Path Matching: {}", policy.matching().as_str());

    match policy.identity_provider() {
        Some(provider) => {
            let _ = writeln!(report, "IDCS URL: {}", provider.base_url());
            let _ = writeln!(report, "Client ID: {}", provider.client_id());
            let _ = writeln!(report, "Client Secret: <redacted>");
        }
        None => {
            let _ = writeln!(report, "IDCS URL: <unset>");
            let _ = writeln!(report, "Client ID: <unset>");
            let _ = writeln!(report, "Client Secret: <unset>");
        }
    }

    report
}

fn describe_failure(error: &InitError) -> String {
    format!("Configuration OK: false\nError: {error}\n")
}
