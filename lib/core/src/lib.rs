//! Core error handling shared by the bucket-gate crates.
//!
//! Each crate defines its own domain-specific error types; this crate only
//! provides the `Result` alias those layers share.

pub mod error;

pub use error::Result;
