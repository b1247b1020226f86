//! In-memory object store.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::{ObjectStore, StoreError, StoredObject};

/// Holds objects in memory, keyed by bucket and key.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    buckets: HashMap<String, HashMap<String, StoredObject>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an empty bucket.
    #[must_use]
    pub fn with_bucket(mut self, bucket: &str) -> Self {
        self.buckets.entry(bucket.to_string()).or_default();
        self
    }

    /// Adds an object, creating its bucket if needed.
    #[must_use]
    pub fn with_object(mut self, bucket: &str, key: &str, object: StoredObject) -> Self {
        self.buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), object);
        self
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn check_bucket(&self, bucket: &str) -> bucket_gate_core::Result<(), StoreError> {
        if self.buckets.contains_key(bucket) {
            Ok(())
        } else {
            Err(StoreError::BucketMissing {
                bucket: bucket.to_string(),
            }
            .into())
        }
    }

    async fn get(
        &self,
        bucket: &str,
        key: &str,
    ) -> bucket_gate_core::Result<StoredObject, StoreError> {
        let objects = self.buckets.get(bucket).ok_or_else(|| StoreError::BucketMissing {
            bucket: bucket.to_string(),
        })?;
        let object = objects.get(key).ok_or_else(|| StoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })?;
        Ok(object.clone())
    }
}
