//! OAuth2 authorization-code flow against the identity provider.
//!
//! A login moves through these states:
//!
//! ```text
//! NoSession -> Authorizing -> CallbackReceived -> TokenExchanged -> SessionEstablished
//!                                   \                  \
//!                                    +------------------+--> AuthFailed
//! ```
//!
//! `Authorizing` is the browser redirect built by [`build_authorize_redirect`];
//! everything from `CallbackReceived` on is driven by [`complete_callback`].
//! The original request path travels through the provider in the `state`
//! parameter and is checked by [`resolve_redirect_location`] before it is
//! used as a redirect target.

use async_trait::async_trait;
use base64::Engine;
use oauth2::basic::BasicClient;
use oauth2::{AuthUrl, ClientId, CsrfToken, RedirectUrl, Scope};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::claims::{IdTokenPayload, IdentityClaims};
use crate::error::{ClaimError, TokenExchangeError};
use crate::policy::IdentityProvider;

/// Path the identity provider redirects back to after login.
pub const CALLBACK_PATH: &str = "/callback/";

/// Scope requested from the identity provider.
pub const OPENID_SCOPE: &str = "openid";

/// Where a login attempt currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    NoSession,
    Authorizing,
    CallbackReceived,
    TokenExchanged,
    SessionEstablished,
    AuthFailed,
}

impl FlowState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoSession => "no_session",
            Self::Authorizing => "authorizing",
            Self::CallbackReceived => "callback_received",
            Self::TokenExchanged => "token_exchanged",
            Self::SessionEstablished => "session_established",
            Self::AuthFailed => "auth_failed",
        }
    }
}

/// Query parameters of a callback request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    /// The authorization code.
    pub code: Option<String>,
    /// The path the user originally requested. Unvalidated.
    pub state: Option<String>,
    /// The error code reported by the provider instead of a code.
    pub error: Option<String>,
}

/// Builds the identity provider authorize URL for a user who requested
/// `original_path`.
///
/// The URL carries `response_type=code`, `client_id`, `redirect_uri`,
/// `scope=openid`, and `state` set to `original_path`.
#[must_use]
pub fn build_authorize_redirect(
    provider: &IdentityProvider,
    callback_url: &Url,
    original_path: &str,
) -> Url {
    let client = BasicClient::new(ClientId::new(provider.client_id().to_string()))
        .set_auth_uri(AuthUrl::from_url(provider.authorize_url().clone()))
        .set_redirect_uri(RedirectUrl::from_url(callback_url.clone()));

    let state = original_path.to_string();
    let (url, _) = client
        .authorize_url(move || CsrfToken::new(state))
        .add_scope(Scope::new(OPENID_SCOPE.to_string()))
        .url();

    debug!(
        state = FlowState::Authorizing.as_str(),
        %original_path,
        "Built authorize redirect"
    );
    url
}

/// Parses the query string of a callback request.
///
/// When a parameter repeats, the first occurrence wins. `state` is not
/// validated here.
#[must_use]
pub fn parse_callback(query: Option<&str>) -> CallbackParams {
    let mut params = CallbackParams::default();

    for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        let slot = match key.as_ref() {
            "code" => &mut params.code,
            "state" => &mut params.state,
            "error" => &mut params.error,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some(value.into_owned());
        }
    }

    params
}

/// Returns the path to send the user to once the callback is handled.
///
/// Only a non-empty `state` beginning with `/` is honoured; anything else
/// falls back to `/`. That includes absolute URLs and scheme-relative
/// `//host` targets, which browsers resolve to another origin. Backslashes
/// and control characters are refused too: browsers read `/\host` as
/// `//host` and drop tabs and newlines, and neither may reach a `Location`
/// header.
#[must_use]
pub fn resolve_redirect_location(params: &CallbackParams) -> String {
    match params.state.as_deref() {
        Some(state) if is_local_path(state) => state.to_string(),
        Some(state) => {
            warn!(?state, "Ignoring callback state that is not a local path");
            "/".to_string()
        }
        None => "/".to_string(),
    }
}

fn is_local_path(state: &str) -> bool {
    state.starts_with('/')
        && !state.starts_with("//")
        && !state.chars().any(|c| c == '\\' || c.is_control())
}

/// A token request for the authorization-code grant.
#[derive(Clone)]
pub struct TokenRequest {
    /// The provider's token endpoint.
    pub token_url: Url,
    /// The authorization code from the callback.
    pub code: String,
    /// The callback URL the code was issued for.
    pub redirect_uri: Url,
    /// The OAuth2 client ID.
    pub client_id: String,
    /// The OAuth2 client secret.
    pub client_secret: String,
}

impl TokenRequest {
    /// Creates a request exchanging `code` with `provider`.
    #[must_use]
    pub fn new(provider: &IdentityProvider, code: &str, callback_url: &Url) -> Self {
        Self {
            token_url: provider.token_url().clone(),
            code: code.to_string(),
            redirect_uri: callback_url.clone(),
            client_id: provider.client_id().to_string(),
            client_secret: provider.client_secret().to_string(),
        }
    }

}

impl std::fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRequest")
            .field("token_url", &self.token_url.as_str())
            .field("code", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Transport for the server-to-server token request.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// POSTs `request` to its token endpoint and returns the raw response body.
    ///
    /// # Errors
    ///
    /// Returns a `TokenExchangeError` on transport failure, timeout, or a
    /// non-success status.
    async fn exchange(
        &self,
        request: &TokenRequest,
    ) -> bucket_gate_core::Result<String, TokenExchangeError>;
}

/// Exchanges an authorization code for the provider's raw token response.
///
/// # Errors
///
/// Returns a `TokenExchangeError` report if the endpoint fails.
pub async fn exchange_code_for_token(
    endpoint: &dyn TokenEndpoint,
    provider: &IdentityProvider,
    code: &str,
    callback_url: &Url,
) -> bucket_gate_core::Result<String, TokenExchangeError> {
    let request = TokenRequest::new(provider, code, callback_url);
    endpoint.exchange(&request).await
}

/// Extracts the subject from a raw token response.
///
/// The body must be a JSON object with an `id_token` field whose payload
/// carries a `sub` claim. The token's signature is NOT verified.
///
/// # Errors
///
/// Returns a `ClaimError` if the body, token, or claim is missing or malformed.
pub fn extract_subject(raw_token_response: &str) -> Result<IdentityClaims, ClaimError> {
    let body: serde_json::Value =
        serde_json::from_str(raw_token_response).map_err(|e| ClaimError::MalformedResponse {
            reason: e.to_string(),
        })?;

    let id_token = body
        .get("id_token")
        .and_then(serde_json::Value::as_str)
        .filter(|token| !token.is_empty())
        .ok_or(ClaimError::MissingClaim { claim: "id_token" })?;

    // header.payload.signature
    let parts: Vec<&str> = id_token.split('.').collect();
    if parts.len() != 3 {
        return Err(ClaimError::InvalidToken {
            reason: "expected three dot-separated segments".to_string(),
        });
    }

    let payload_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| ClaimError::InvalidToken {
            reason: format!("payload is not base64url: {e}"),
        })?;

    let payload: IdTokenPayload =
        serde_json::from_slice(&payload_bytes).map_err(|e| ClaimError::InvalidToken {
            reason: format!("payload is not a JSON object: {e}"),
        })?;

    payload
        .into_claims()
        .ok_or(ClaimError::MissingClaim { claim: "sub" })
}

/// How a callback request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The code was exchanged and a subject extracted.
    SessionEstablished {
        location: String,
        claims: IdentityClaims,
    },
    /// The login did not produce a subject; no session is set.
    AuthFailed { location: String, reason: String },
}

impl CallbackOutcome {
    /// Returns the redirect location for the browser.
    #[must_use]
    pub fn location(&self) -> &str {
        match self {
            Self::SessionEstablished { location, .. } | Self::AuthFailed { location, .. } => {
                location
            }
        }
    }

    /// Returns the terminal state this outcome represents.
    #[must_use]
    pub fn state(&self) -> FlowState {
        match self {
            Self::SessionEstablished { .. } => FlowState::SessionEstablished,
            Self::AuthFailed { .. } => FlowState::AuthFailed,
        }
    }
}

/// Runs the callback leg of the flow: resolve the return location, exchange
/// the code, and extract the subject.
///
/// Failures never escape; they end in [`CallbackOutcome::AuthFailed`] with
/// the same resolved location, so the browser can start over.
#[instrument(skip_all)]
pub async fn complete_callback(
    endpoint: &dyn TokenEndpoint,
    provider: &IdentityProvider,
    params: &CallbackParams,
    callback_url: &Url,
) -> CallbackOutcome {
    let location = resolve_redirect_location(params);
    debug!(
        state = FlowState::CallbackReceived.as_str(),
        %location,
        "Processing callback"
    );

    let failed = |reason: String| {
        warn!(state = FlowState::AuthFailed.as_str(), %reason, "Login failed");
        CallbackOutcome::AuthFailed {
            location: location.clone(),
            reason,
        }
    };

    let Some(code) = params.code.as_deref().filter(|c| !c.is_empty()) else {
        let reason = match &params.error {
            Some(error) => format!("identity provider returned error '{error}'"),
            None => "callback carried no authorization code".to_string(),
        };
        return failed(reason);
    };

    let raw = match exchange_code_for_token(endpoint, provider, code, callback_url).await {
        Ok(raw) => raw,
        Err(error) => return failed(error.to_string()),
    };
    debug!(state = FlowState::TokenExchanged.as_str(), "Token response received");

    match extract_subject(&raw) {
        Ok(claims) => {
            info!(
                state = FlowState::SessionEstablished.as_str(),
                subject = %claims.subject,
                %location,
                "Login completed"
            );
            CallbackOutcome::SessionEstablished { location, claims }
        }
        Err(error) => failed(error.to_string()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rootcause::Report;
    use std::sync::Mutex;

    /// Encodes `payload` as an unsigned JWT.
    pub(crate) fn unsigned_jwt(payload: &str) -> String {
        let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        format!(
            "{}.{}.{}",
            engine.encode(r#"{"alg":"RS256","typ":"JWT"}"#),
            engine.encode(payload),
            engine.encode("not-a-signature")
        )
    }

    /// Token endpoint returning a canned answer and recording requests.
    pub(crate) struct StubEndpoint {
        answer: std::result::Result<String, TokenExchangeError>,
        pub(crate) requests: Mutex<Vec<TokenRequest>>,
    }

    impl StubEndpoint {
        pub(crate) fn answering(body: &str) -> Self {
            Self {
                answer: Ok(body.to_string()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing(error: TokenExchangeError) -> Self {
            Self {
                answer: Err(error),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn for_subject(subject: &str) -> Self {
            let token = unsigned_jwt(&format!(r#"{{"sub":"{subject}"}}"#));
            Self::answering(&format!(r#"{{"id_token":"{token}","token_type":"Bearer"}}"#))
        }

        pub(crate) fn request_count(&self) -> usize {
            self.requests.lock().expect("lock").len()
        }
    }

    #[async_trait]
    impl TokenEndpoint for StubEndpoint {
        async fn exchange(
            &self,
            request: &TokenRequest,
        ) -> bucket_gate_core::Result<String, TokenExchangeError> {
            self.requests.lock().expect("lock").push(request.clone());
            self.answer.clone().map_err(Report::from)
        }
    }

    fn provider() -> IdentityProvider {
        IdentityProvider::new(
            "https://idcs.example.com",
            "client-123".to_string(),
            "s3cr3t".to_string(),
        )
        .expect("valid provider")
    }

    fn callback_url() -> Url {
        Url::parse("https://files.example.com/callback/").expect("valid url")
    }

    fn query_value(url: &Url, key: &str) -> Option<String> {
        url.query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    #[test]
    fn authorize_redirect_carries_required_parameters() {
        let url = build_authorize_redirect(&provider(), &callback_url(), "/secret/");

        assert_eq!(url.host_str(), Some("idcs.example.com"));
        assert_eq!(url.path(), "/oauth2/v1/authorize");
        assert_eq!(query_value(&url, "response_type").as_deref(), Some("code"));
        assert_eq!(query_value(&url, "client_id").as_deref(), Some("client-123"));
        assert_eq!(
            query_value(&url, "redirect_uri").as_deref(),
            Some("https://files.example.com/callback/")
        );
        assert_eq!(query_value(&url, "scope").as_deref(), Some("openid"));
        assert_eq!(query_value(&url, "state").as_deref(), Some("/secret/"));
    }

    #[test]
    fn authorize_redirect_never_carries_the_secret() {
        let url = build_authorize_redirect(&provider(), &callback_url(), "/secret/");
        assert!(!url.as_str().contains("s3cr3t"));
    }

    #[test]
    fn parse_callback_decodes_parameters() {
        let params = parse_callback(Some("code=ABC&state=%2Fsecret%2Fa%20b.txt"));

        assert_eq!(params.code.as_deref(), Some("ABC"));
        assert_eq!(params.state.as_deref(), Some("/secret/a b.txt"));
        assert_eq!(params.error, None);
    }

    #[test]
    fn parse_callback_keeps_first_occurrence() {
        let params = parse_callback(Some("state=/first&state=/second"));
        assert_eq!(params.state.as_deref(), Some("/first"));
    }

    #[test]
    fn parse_callback_without_query() {
        assert_eq!(parse_callback(None), CallbackParams::default());
    }

    #[test]
    fn redirect_location_honours_local_paths() {
        let params = parse_callback(Some("state=/secret"));
        assert_eq!(resolve_redirect_location(&params), "/secret");
    }

    #[test]
    fn redirect_location_rejects_foreign_targets() {
        for query in [
            "state=https://evil.example/",
            "state=",
            "code=ABC",
            "state=//evil.example/",
            "state=evil",
        ] {
            let params = parse_callback(Some(query));
            assert_eq!(resolve_redirect_location(&params), "/", "for {query}");
        }
    }

    #[test]
    fn redirect_location_rejects_backslash_targets() {
        for state in ["/\\evil.example/", "/\\/evil.example/", "/a\\b"] {
            let params = CallbackParams {
                state: Some(state.to_string()),
                ..CallbackParams::default()
            };
            assert_eq!(resolve_redirect_location(&params), "/", "for {state:?}");
        }
    }

    #[test]
    fn redirect_location_rejects_control_characters() {
        for query in [
            "state=%2F%09%2Fevil.example%2F",
            "state=%2Fa%0D%0ASet-Cookie:%20x=y",
            "state=%2Fsecret%00",
        ] {
            let params = parse_callback(Some(query));
            assert_eq!(resolve_redirect_location(&params), "/", "for {query}");
        }
    }

    #[test]
    fn token_request_carries_exchange_fields() {
        let request = TokenRequest::new(&provider(), "ABC", &callback_url());

        assert_eq!(request.code, "ABC");
        assert_eq!(
            request.redirect_uri.as_str(),
            "https://files.example.com/callback/"
        );
        assert_eq!(request.client_id, "client-123");
        assert_eq!(request.client_secret, "s3cr3t");
        assert_eq!(
            request.token_url.as_str(),
            "https://idcs.example.com/oauth2/v1/token"
        );
    }

    #[test]
    fn token_request_debug_redacts_secrets() {
        let request = TokenRequest::new(&provider(), "ABC", &callback_url());
        let rendered = format!("{request:?}");
        assert!(!rendered.contains("s3cr3t"));
        assert!(!rendered.contains("ABC"));
    }

    #[test]
    fn extract_subject_reads_sub_claim() {
        let token = unsigned_jwt(r#"{"sub":"alice","iss":"https://idcs.example.com"}"#);
        let raw = format!(r#"{{"id_token":"{token}"}}"#);

        let claims = extract_subject(&raw).expect("claims");

        assert_eq!(claims.subject, "alice");
        assert_eq!(claims.issuer.as_deref(), Some("https://idcs.example.com"));
    }

    #[test]
    fn extract_subject_requires_id_token() {
        let err = extract_subject(r#"{"access_token":"abc"}"#).expect_err("no id_token");
        assert_eq!(err, ClaimError::MissingClaim { claim: "id_token" });
    }

    #[test]
    fn extract_subject_requires_sub() {
        let token = unsigned_jwt(r#"{"iss":"https://idcs.example.com"}"#);
        let err = extract_subject(&format!(r#"{{"id_token":"{token}"}}"#)).expect_err("no sub");
        assert_eq!(err, ClaimError::MissingClaim { claim: "sub" });
    }

    #[test]
    fn extract_subject_rejects_malformed_input() {
        assert!(matches!(
            extract_subject("not json"),
            Err(ClaimError::MalformedResponse { .. })
        ));
        assert!(matches!(
            extract_subject(r#"{"id_token":"only.two"}"#),
            Err(ClaimError::InvalidToken { .. })
        ));
        assert!(matches!(
            extract_subject(r#"{"id_token":"a.!!!.c"}"#),
            Err(ClaimError::InvalidToken { .. })
        ));
    }

    #[tokio::test]
    async fn complete_callback_establishes_session() {
        let endpoint = StubEndpoint::for_subject("alice");
        let params = parse_callback(Some("code=ABC&state=/secret/"));

        let outcome = complete_callback(&endpoint, &provider(), &params, &callback_url()).await;

        assert_eq!(outcome.state(), FlowState::SessionEstablished);
        assert_eq!(outcome.location(), "/secret/");
        let requests = endpoint.requests.lock().expect("lock");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].code, "ABC");
        assert_eq!(requests[0].redirect_uri, callback_url());
    }

    #[tokio::test]
    async fn complete_callback_without_code_skips_exchange() {
        let endpoint = StubEndpoint::for_subject("alice");
        let params = parse_callback(Some("error=access_denied&state=/secret/"));

        let outcome = complete_callback(&endpoint, &provider(), &params, &callback_url()).await;

        assert_eq!(outcome.state(), FlowState::AuthFailed);
        assert_eq!(outcome.location(), "/secret/");
        assert_eq!(endpoint.request_count(), 0);
    }

    #[tokio::test]
    async fn complete_callback_fails_on_exchange_error() {
        let endpoint = StubEndpoint::failing(TokenExchangeError::Rejected {
            reason: "invalid_grant".to_string(),
        });
        let params = parse_callback(Some("code=ABC&state=https://evil.example/"));

        let outcome = complete_callback(&endpoint, &provider(), &params, &callback_url()).await;

        assert!(
            matches!(&outcome, CallbackOutcome::AuthFailed { location, reason } if location == "/" && reason.contains("invalid_grant"))
        );
    }

    #[tokio::test]
    async fn complete_callback_fails_on_missing_claim() {
        let endpoint = StubEndpoint::answering(r#"{"access_token":"abc"}"#);
        let params = parse_callback(Some("code=ABC&state=/secret/"));

        let outcome = complete_callback(&endpoint, &provider(), &params, &callback_url()).await;

        assert_eq!(outcome.state(), FlowState::AuthFailed);
    }
}
