//! Token endpoint client built on oauth2 over reqwest.

use std::time::Duration;

use async_trait::async_trait;
use bucket_gate_access::{TokenEndpoint, TokenExchangeError, TokenRequest};
use oauth2::basic::{
    BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
    BasicTokenType,
};
use oauth2::{
    AuthType, AuthorizationCode, Client, ClientId, ClientSecret, ExtraTokenFields,
    HttpClientError as OAuthHttpError, RedirectUrl, RequestTokenError, StandardRevocableToken,
    StandardTokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::HttpClientError;

/// Token response fields beyond RFC 6749 that the gate reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IdTokenFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id_token: Option<String>,
}

impl ExtraTokenFields for IdTokenFields {}

type IdTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;

type IdTokenClient = Client<
    BasicErrorResponse,
    IdTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
>;

/// Exchanges authorization codes at the identity provider's token endpoint.
pub struct HttpTokenEndpoint {
    http_client: reqwest::Client,
}

impl HttpTokenEndpoint {
    /// Creates a client whose requests give up after `timeout`.
    ///
    /// Redirects are not followed.
    pub fn new(timeout: Duration) -> Result<Self, HttpClientError> {
        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| HttpClientError::Build(e.to_string()))?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl TokenEndpoint for HttpTokenEndpoint {
    #[instrument(skip_all, fields(token_url = %request.token_url))]
    async fn exchange(
        &self,
        request: &TokenRequest,
    ) -> bucket_gate_core::Result<String, TokenExchangeError> {
        // Client credentials travel in the form body, next to the code.
        let client = IdTokenClient::new(ClientId::new(request.client_id.clone()))
            .set_client_secret(ClientSecret::new(request.client_secret.clone()))
            .set_auth_type(AuthType::RequestBody)
            .set_token_uri(TokenUrl::from_url(request.token_url.clone()))
            .set_redirect_uri(RedirectUrl::from_url(request.redirect_uri.clone()));

        let token = client
            .exchange_code(AuthorizationCode::new(request.code.clone()))
            .request_async(&self.http_client)
            .await
            .map_err(exchange_error)?;
        debug!(
            has_id_token = token.extra_fields().id_token.is_some(),
            "Token endpoint answered"
        );

        let body = serde_json::to_string(&token).map_err(|e| TokenExchangeError::Body {
            reason: e.to_string(),
        })?;

        Ok(body)
    }
}

/// Maps an oauth2 failure, keeping URLs and response bodies out of the message.
fn exchange_error(
    error: RequestTokenError<OAuthHttpError<reqwest::Error>, BasicErrorResponse>,
) -> TokenExchangeError {
    match error {
        RequestTokenError::ServerResponse(response) => TokenExchangeError::Rejected {
            reason: response.to_string(),
        },
        RequestTokenError::Request(OAuthHttpError::Reqwest(e)) => TokenExchangeError::Transport {
            reason: e.without_url().to_string(),
        },
        RequestTokenError::Request(e) => TokenExchangeError::Transport {
            reason: e.to_string(),
        },
        RequestTokenError::Parse(e, _) => TokenExchangeError::Body {
            reason: e.to_string(),
        },
        RequestTokenError::Other(reason) => TokenExchangeError::Rejected { reason },
    }
}
