//! In-memory stores for ephemeral sessions and tests.

use super::{BlobStore, MetadataStore};
use crate::error::StoreResult;
use crate::types::{DurableImageEntry, PersistedMetadata, PhotoId};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    inner: Mutex<Option<PersistedMetadata>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated store, as if a previous session had saved `metadata`.
    pub fn with(metadata: PersistedMetadata) -> Self {
        Self {
            inner: Mutex::new(Some(metadata)),
        }
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn load(&self) -> StoreResult<Option<PersistedMetadata>> {
        Ok(self.inner.lock().await.clone())
    }

    async fn save(&self, metadata: &PersistedMetadata) -> StoreResult<()> {
        *self.inner.lock().await = Some(metadata.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    entries: Mutex<HashMap<PhotoId, DurableImageEntry>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, id: PhotoId) -> StoreResult<Option<DurableImageEntry>> {
        Ok(self.entries.lock().await.get(&id).cloned())
    }

    async fn put(&self, entry: &DurableImageEntry) -> StoreResult<()> {
        self.entries.lock().await.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn delete(&self, id: PhotoId) -> StoreResult<bool> {
        Ok(self.entries.lock().await.remove(&id).is_some())
    }

    async fn keys(&self) -> StoreResult<Vec<PhotoId>> {
        Ok(self.entries.lock().await.keys().copied().collect())
    }
}
