//! Request gating for bucket-gate.
//!
//! This crate decides, for each request to the object gateway, whether to
//! serve the object, send the browser through an OAuth2 authorization-code
//! login, finish such a login, or fail:
//! - Settings validation into an immutable [`AccessPolicy`]
//! - Protected path matching ([`is_protected`])
//! - The `username` session cookie ([`SessionCodec`], [`Rot13Codec`])
//! - The OAuth2 login flow ([`oidc`])
//! - The per-request decision ([`RequestRouter`], [`RouteDecision`])
//!
//! # Trust model
//!
//! The session cookie is an obfuscated username with no signature or
//! expiry, and the ID token is decoded without verifying its signature
//! because it was fetched server-to-server from the token endpoint. Both
//! should be hardened before guarding anything sensitive.
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use bucket_gate_access::{AccessPolicy, is_protected, object_key};
//!
//! let settings: HashMap<String, String> = [
//!     ("BucketName", "site"),
//!     ("ProtectedPaths", "/members/"),
//!     ("IDCSURL", "https://idcs.example.com"),
//!     ("ClientID", "client-123"),
//!     ("ClientSecret", "secret"),
//! ]
//! .into_iter()
//! .map(|(k, v)| (k.to_string(), v.to_string()))
//! .collect();
//!
//! let policy = AccessPolicy::from_settings(&settings).expect("valid settings");
//!
//! assert!(is_protected(&policy, "/members/welcome.html"));
//! assert!(!is_protected(&policy, "/about/"));
//! assert_eq!(object_key("/about/"), "about/index.html");
//! ```

pub mod claims;
pub mod error;
pub mod matcher;
pub mod oidc;
pub mod policy;
pub mod router;
pub mod session;

// Re-export main types at crate root
pub use claims::IdentityClaims;
pub use error::{ClaimError, ConfigError, DecodeError, TokenExchangeError};
pub use matcher::is_protected;
pub use oidc::{CallbackOutcome, CallbackParams, FlowState, TokenEndpoint, TokenRequest};
pub use policy::{AccessPolicy, IdentityProvider, MatchMode};
pub use router::{GateRequest, RequestRouter, RouteDecision, object_key};
pub use session::{Rot13Codec, SESSION_COOKIE, SessionCodec, SessionCookie};
