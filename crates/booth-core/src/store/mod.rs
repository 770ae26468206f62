//! Durable storage: a small metadata store and a per-photo blob store.
//!
//! The traits are the seam the lifecycle manager writes through. The
//! filesystem implementations survive restarts; the in-memory ones back
//! ephemeral sessions and tests.

mod fs;
mod memory;
mod reconcile;

pub use fs::{open_fs, FsBlobStore, FsMetadataStore};
pub use memory::{MemoryBlobStore, MemoryMetadataStore};
pub use reconcile::{reconcile, ReconcileReport, Reconciled};

use crate::error::StoreResult;
use crate::types::{DurableImageEntry, PersistedMetadata, PhotoId};
use async_trait::async_trait;

/// Fixed name of the metadata record.
pub const METADATA_STORE_NAME: &str = "booth-state";

/// Prompt history, last prompt, and known photo ids.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Load the stored metadata, or `None` if nothing has been saved yet.
    async fn load(&self) -> StoreResult<Option<PersistedMetadata>>;

    /// Replace the stored metadata.
    async fn save(&self, metadata: &PersistedMetadata) -> StoreResult<()>;
}

/// One [`DurableImageEntry`] per photo id.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, id: PhotoId) -> StoreResult<Option<DurableImageEntry>>;

    /// Insert or replace the entry for `entry.id`.
    async fn put(&self, entry: &DurableImageEntry) -> StoreResult<()>;

    /// Remove an entry. Returns whether it existed.
    async fn delete(&self, id: PhotoId) -> StoreResult<bool>;

    /// Every id with a stored entry, in no particular order.
    async fn keys(&self) -> StoreResult<Vec<PhotoId>>;
}
