//! Per-request gating decision.
//!
//! [`RequestRouter::route`] turns a request into a [`RouteDecision`]. It
//! never fails: configuration problems, bad cookies, and identity provider
//! errors all end up as one of the decision variants. Object retrieval is
//! left to the caller, which turns any lookup failure into
//! [`RouteDecision::NotFound`].

use std::sync::Arc;

use http::HeaderMap;
use http::header::{COOKIE, HOST};
use tracing::{debug, error, info};
use url::Url;

use crate::error::ConfigError;
use crate::matcher::is_protected;
use crate::oidc::{
    CALLBACK_PATH, CallbackOutcome, TokenEndpoint, build_authorize_redirect, complete_callback,
    parse_callback,
};
use crate::policy::AccessPolicy;
use crate::session::{Rot13Codec, SessionCodec, SessionCookie, find_session_value};

/// Message returned when the gate settings are invalid.
pub const INVALID_CONFIGURATION: &str = "Invalid configuration. Please see logs";

/// What to do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Serve the object stored under this key.
    ServeObject(String),
    /// Send the browser to the identity provider.
    RedirectToLogin(Url),
    /// Finish a login: redirect to `location`, setting the session cookie
    /// only if the login succeeded.
    RedirectFromCallback {
        location: String,
        session: Option<SessionCookie>,
    },
    /// The object could not be retrieved.
    NotFound,
    /// The request could not be handled.
    ServerError(String),
}

/// The parts of an inbound request the router looks at.
#[derive(Debug, Clone, Copy)]
pub struct GateRequest<'a> {
    /// HTTP method, only logged.
    pub method: &'a str,
    /// Absolute request path without the query string.
    pub path: &'a str,
    /// Raw query string, if any.
    pub query: Option<&'a str>,
    /// Request headers; `host` and `cookie` are read.
    pub headers: &'a HeaderMap,
}

/// Maps a request path to an object key.
///
/// Paths ending in `/` get an implicit `index.html`; the single leading `/`
/// is stripped.
#[must_use]
pub fn object_key(path: &str) -> String {
    let key = path.strip_prefix('/').unwrap_or(path);
    if key.is_empty() || key.ends_with('/') {
        format!("{key}index.html")
    } else {
        key.to_string()
    }
}

/// Decides, per request, whether to serve, redirect, or reject.
#[derive(Clone)]
pub struct RequestRouter {
    endpoint: Arc<dyn TokenEndpoint>,
    codec: Arc<dyn SessionCodec>,
    callback_scheme: String,
}

impl RequestRouter {
    /// Creates a router exchanging codes through `endpoint`, using
    /// [`Rot13Codec`] sessions and `https` callback URLs.
    #[must_use]
    pub fn new(endpoint: Arc<dyn TokenEndpoint>) -> Self {
        Self {
            endpoint,
            codec: Arc::new(Rot13Codec),
            callback_scheme: "https".to_string(),
        }
    }

    /// Replaces the session codec.
    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn SessionCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Sets the scheme used when building the callback URL.
    #[must_use]
    pub fn with_callback_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.callback_scheme = scheme.into();
        self
    }

    /// Routes a request under `policy`.
    ///
    /// `policy` is the outcome of validating the gate settings; an invalid
    /// configuration turns every request into a server error.
    pub async fn route(
        &self,
        policy: Result<&AccessPolicy, &ConfigError>,
        request: &GateRequest<'_>,
    ) -> RouteDecision {
        let policy = match policy {
            Ok(policy) => policy,
            Err(e) => {
                error!(error = %e, "Configuration not OK, rejecting request");
                return RouteDecision::ServerError(INVALID_CONFIGURATION.to_string());
            }
        };

        debug!(method = %request.method, path = %request.path, "Routing request");
        let key = object_key(request.path);

        if !policy.has_protection() {
            return RouteDecision::ServeObject(key);
        }

        if request.path.starts_with(CALLBACK_PATH) {
            return self.handle_callback(policy, request).await;
        }

        if !is_protected(policy, request.path) {
            info!(path = %request.path, "Path is not protected");
            return RouteDecision::ServeObject(key);
        }
        info!(path = %request.path, "Path is protected");

        if let Some(username) = self.session_username(request.headers) {
            info!(%username, "Session cookie accepted");
            return RouteDecision::ServeObject(key);
        }

        let Some(provider) = policy.identity_provider() else {
            return RouteDecision::ServerError("identity provider is not configured".to_string());
        };
        // The whole request target comes back as `state`, query included.
        let original = match request.query {
            Some(query) if !query.is_empty() => format!("{}?{query}", request.path),
            _ => request.path.to_string(),
        };
        match self.callback_url(request.headers) {
            Ok(callback_url) => RouteDecision::RedirectToLogin(build_authorize_redirect(
                provider,
                &callback_url,
                &original,
            )),
            Err(message) => RouteDecision::ServerError(message),
        }
    }

    async fn handle_callback(
        &self,
        policy: &AccessPolicy,
        request: &GateRequest<'_>,
    ) -> RouteDecision {
        let Some(provider) = policy.identity_provider() else {
            return RouteDecision::ServerError("identity provider is not configured".to_string());
        };
        let callback_url = match self.callback_url(request.headers) {
            Ok(url) => url,
            Err(message) => return RouteDecision::ServerError(message),
        };

        let params = parse_callback(request.query);
        let outcome =
            complete_callback(self.endpoint.as_ref(), provider, &params, &callback_url).await;

        match outcome {
            CallbackOutcome::SessionEstablished { location, claims } => {
                RouteDecision::RedirectFromCallback {
                    location,
                    session: Some(SessionCookie::for_subject(
                        self.codec.as_ref(),
                        &claims.subject,
                    )),
                }
            }
            CallbackOutcome::AuthFailed { location, .. } => RouteDecision::RedirectFromCallback {
                location,
                session: None,
            },
        }
    }

    fn session_username(&self, headers: &HeaderMap) -> Option<String> {
        let value = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(find_session_value);

        let Some(value) = value else {
            debug!("No session cookie");
            return None;
        };

        match self.codec.decode(value) {
            Ok(username) => Some(username),
            Err(e) => {
                debug!(error = %e, "Ignoring undecodable session cookie");
                None
            }
        }
    }

    /// Builds `{scheme}://{host}/callback/` from the request's `host` header.
    fn callback_url(&self, headers: &HeaderMap) -> Result<Url, String> {
        let host = headers
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| "request has no host header".to_string())?;

        let raw = format!("{}://{host}{CALLBACK_PATH}", self.callback_scheme);
        Url::parse(&raw).map_err(|e| format!("cannot build callback URL from host '{host}': {e}"))
    }
}
