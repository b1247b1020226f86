//! Error types for the access crate.
//!
//! Each stage of request gating has its own error type so the router can
//! apply a distinct policy to each:
//! - `ConfigError`: the gate settings are unusable
//! - `DecodeError`: a session cookie could not be decoded (treated as "no session")
//! - `TokenExchangeError`: the identity provider's token endpoint failed
//! - `ClaimError`: the token response did not carry a usable subject

use std::fmt;

/// Errors from validating gate settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required setting is absent or empty.
    MissingSetting { key: &'static str },
    /// A protected path does not begin with `/`.
    InvalidProtectedPath { path: String },
    /// The identity provider base URL is not an absolute URL.
    InvalidProviderUrl { url: String, reason: String },
    /// The protected path matching mode is not recognised.
    InvalidMatchingMode { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSetting { key } => {
                write!(f, "missing required setting: {key}")
            }
            Self::InvalidProtectedPath { path } => {
                write!(f, "invalid protected path: '{path}' does not begin with '/'")
            }
            Self::InvalidProviderUrl { url, reason } => {
                write!(f, "invalid identity provider URL '{url}': {reason}")
            }
            Self::InvalidMatchingMode { value } => {
                write!(
                    f,
                    "invalid protected path matching mode '{value}', expected 'first' or 'any'"
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors from decoding a session cookie value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The cookie value is empty.
    Empty,
    /// The cookie value contains a character a cookie value may not carry.
    InvalidCharacter { position: usize },
    /// A `%` is not followed by two hex digits.
    InvalidEscape { position: usize },
    /// The unescaped value is not UTF-8.
    InvalidUtf8,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "session cookie is empty"),
            Self::InvalidCharacter { position } => {
                write!(f, "session cookie has an invalid character at {position}")
            }
            Self::InvalidEscape { position } => {
                write!(f, "session cookie has a malformed escape at {position}")
            }
            Self::InvalidUtf8 => write!(f, "session cookie is not valid UTF-8 once unescaped"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Errors from exchanging an authorization code at the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenExchangeError {
    /// The request never produced a response (connect failure, timeout, TLS).
    Transport { reason: String },
    /// The token endpoint refused the exchange.
    Rejected { reason: String },
    /// The response body could not be read or parsed.
    Body { reason: String },
}

impl fmt::Display for TokenExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport { reason } => {
                write!(f, "token endpoint request failed: {reason}")
            }
            Self::Rejected { reason } => {
                write!(f, "token endpoint rejected the exchange: {reason}")
            }
            Self::Body { reason } => {
                write!(f, "failed to read token endpoint response: {reason}")
            }
        }
    }
}

impl std::error::Error for TokenExchangeError {}

/// Errors from extracting identity claims out of a token response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimError {
    /// The token response is not a JSON object.
    MalformedResponse { reason: String },
    /// A required field or claim is absent or empty.
    MissingClaim { claim: &'static str },
    /// The ID token is not a decodable JWT.
    InvalidToken { reason: String },
}

impl fmt::Display for ClaimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedResponse { reason } => {
                write!(f, "malformed token response: {reason}")
            }
            Self::MissingClaim { claim } => {
                write!(f, "missing required claim: {claim}")
            }
            Self::InvalidToken { reason } => {
                write!(f, "invalid ID token: {reason}")
            }
        }
    }
}

impl std::error::Error for ClaimError {}
