//! In-memory artifact store for tests and local development.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::store::ArtifactStore;

/// Artifact store backed by a process-local map.
#[derive(Default)]
pub struct MemoryArtifactStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object directly, bypassing the filesystem.
    pub async fn put(&self, key: impl Into<String>, bytes: Vec<u8>) {
        self.objects.write().await.insert(key.into(), bytes);
    }

    /// Read an object's bytes, if present.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(key).cloned()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn fetch(&self, key: &str, dest: &Path) -> StorageResult<()> {
        let bytes = self
            .objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::not_found(key))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, bytes).await?;
        Ok(())
    }

    async fn store(&self, src: &Path, key: &str) -> StorageResult<String> {
        let bytes = tokio::fs::read(src).await?;
        debug!("Storing {} bytes as {}", bytes.len(), key);
        self.objects.write().await.insert(key.to_string(), bytes);
        Ok(key.to_string())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.objects.read().await.contains_key(key))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.objects.write().await.remove(key);
        Ok(())
    }
}
