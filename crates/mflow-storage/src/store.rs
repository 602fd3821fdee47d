//! The artifact store trait.

use std::path::Path;

use async_trait::async_trait;

use crate::error::StorageResult;

/// Uniform interface to remote object storage.
///
/// `store` must be idempotent under retry: repeating it with the same local
/// content and key produces the same remote state, so retries after an
/// ambiguous failure (for example a timeout after a successful write) are
/// safe.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Fetch the object at `key` into `dest`. Parent directories are
    /// created as needed.
    async fn fetch(&self, key: &str, dest: &Path) -> StorageResult<()>;

    /// Store the file at `src` under `key`, returning the key.
    async fn store(&self, src: &Path, key: &str) -> StorageResult<String>;

    /// Whether an object exists at `key`.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Delete the object at `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;
}
