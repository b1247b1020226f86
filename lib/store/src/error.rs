//! Object store error types.

use std::fmt;

/// Errors from reading the object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No object exists under the key.
    NotFound { bucket: String, key: String },
    /// The bucket does not exist.
    BucketMissing { bucket: String },
    /// The key cannot name an object.
    InvalidKey { key: String },
    /// The backend failed.
    Backend { details: String },
}

impl StoreError {
    /// Returns true if the object or its bucket does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::BucketMissing { .. })
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { bucket, key } => {
                write!(f, "object '{key}' not found in bucket '{bucket}'")
            }
            Self::BucketMissing { bucket } => write!(f, "bucket '{bucket}' does not exist"),
            Self::InvalidKey { key } => write!(f, "invalid object key '{key}'"),
            Self::Backend { details } => write!(f, "object store error: {details}"),
        }
    }
}

impl std::error::Error for StoreError {}
