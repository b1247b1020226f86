//! Error handling foundation for bucket-gate.
//!
//! This module provides only the `Result` type alias using rootcause.
//! Domain crates define their own error enums and wrap them in a
//! [`Report`] when the failure crosses an I/O boundary (object store,
//! identity provider), adding context with `.context()` as they go.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
