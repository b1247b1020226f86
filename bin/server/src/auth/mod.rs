//! Identity provider plumbing for the server.
//!
//! The authorization-code flow itself lives in `bucket-gate-access`; this
//! module supplies the HTTP transport it runs over.

pub mod oidc;

pub use oidc::HttpTokenEndpoint;
