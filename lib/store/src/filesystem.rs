//! Filesystem-backed object store.
//!
//! Each bucket is a directory under the store root and each key a path
//! relative to it.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mime_guess::MimeGuess;
use tracing::{debug, instrument};

use crate::{ObjectStore, StoreError, StoredObject};

/// Serves objects from `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct FilesystemStore {
    root_dir: PathBuf,
}

impl FilesystemStore {
    /// Creates a store rooted at `root_dir`.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Returns the store root.
    #[must_use]
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, StoreError> {
        if !is_plain_segment(bucket) {
            return Err(StoreError::BucketMissing {
                bucket: bucket.to_string(),
            });
        }
        Ok(self.root_dir.join(bucket))
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty() || !key.split('/').all(is_plain_segment) {
            return Err(StoreError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.bucket_dir(bucket)?.join(key))
    }
}

/// A path segment that cannot climb out of its directory.
fn is_plain_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".." && !segment.contains('\\')
}

#[async_trait]
impl ObjectStore for FilesystemStore {
    async fn check_bucket(&self, bucket: &str) -> bucket_gate_core::Result<(), StoreError> {
        let dir = self.bucket_dir(bucket)?;
        match tokio::fs::metadata(&dir).await {
            Ok(metadata) if metadata.is_dir() => Ok(()),
            Ok(_) => Err(StoreError::BucketMissing {
                bucket: bucket.to_string(),
            }
            .into()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::BucketMissing {
                bucket: bucket.to_string(),
            }
            .into()),
            Err(e) => Err(StoreError::Backend {
                details: e.to_string(),
            }
            .into()),
        }
    }

    #[instrument(skip(self))]
    async fn get(
        &self,
        bucket: &str,
        key: &str,
    ) -> bucket_gate_core::Result<StoredObject, StoreError> {
        let path = self.object_path(bucket, key)?;
        let not_found = || StoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        };

        let metadata = tokio::fs::metadata(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => not_found(),
            _ => StoreError::Backend {
                details: e.to_string(),
            },
        })?;
        if !metadata.is_file() {
            debug!(path = ?path, "Path is not a file");
            return Err(not_found().into());
        }

        let content = tokio::fs::read(&path)
            .await
            .map_err(|e| StoreError::Backend {
                details: e.to_string(),
            })?;
        let content_type = MimeGuess::from_path(&path)
            .first_or_octet_stream()
            .to_string();

        debug!(size = content.len(), %content_type, "Read object");
        Ok(StoredObject {
            content,
            content_type,
        })
    }
}
