//! Object store access for bucket-gate.
//!
//! The gate only ever reads objects, by bucket and key. [`ObjectStore`] is
//! the seam; [`FilesystemStore`] serves a directory per bucket and
//! [`MemoryStore`] holds objects in memory.

mod error;
mod filesystem;
mod memory;

pub use error::StoreError;
pub use filesystem::FilesystemStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

/// An object read from a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// The object's bytes.
    pub content: Vec<u8>,
    /// The object's content type.
    pub content_type: String,
}

impl StoredObject {
    /// Creates an object from its bytes and content type.
    #[must_use]
    pub fn new(content: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            content_type: content_type.into(),
        }
    }
}

/// Read access to bucketed objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Checks that `bucket` can be read from.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::BucketMissing` if the bucket does not exist.
    async fn check_bucket(&self, bucket: &str) -> bucket_gate_core::Result<(), StoreError>;

    /// Reads the object stored under `key` in `bucket`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if there is no such object, or another
    /// `StoreError` if the backend fails.
    async fn get(&self, bucket: &str, key: &str)
    -> bucket_gate_core::Result<StoredObject, StoreError>;
}
