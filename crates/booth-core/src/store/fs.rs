//! Filesystem-backed stores.
//!
//! Layout under the data directory:
//!
//! ```text
//! <data_dir>/booth-state.json      metadata
//! <data_dir>/images/<photo-id>.json one entry per photo, bytes as base64
//! ```
//!
//! Every write goes to a uniquely named sibling temp file first and is renamed
//! into place, so a crash mid-write leaves the previous record intact and
//! concurrent writers of one record never share a temp file.

use super::{BlobStore, MetadataStore, METADATA_STORE_NAME};
use crate::error::{StoreError, StoreResult};
use crate::types::{DurableImageEntry, PersistedMetadata, PhotoId};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const ENTRY_EXTENSION: &str = "json";
const TEMP_SUFFIX: &str = ".tmp";

/// Open (creating if needed) the metadata and blob stores under `data_dir`.
pub async fn open_fs(data_dir: &Path) -> StoreResult<(FsMetadataStore, FsBlobStore)> {
    tokio::fs::create_dir_all(data_dir).await?;
    let metadata = FsMetadataStore::new(data_dir.join(format!("{METADATA_STORE_NAME}.json")));
    let blobs = FsBlobStore::open(data_dir.join("images")).await?;
    tracing::debug!("Opened durable store at {}", data_dir.display());
    Ok((metadata, blobs))
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".{}{TEMP_SUFFIX}", Uuid::new_v4().simple()));
    let tmp = path.with_file_name(name);

    let written = match tokio::fs::write(&tmp, bytes).await {
        Ok(()) => tokio::fs::rename(&tmp, path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

async fn read_optional(path: &Path) -> StoreResult<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Metadata stored as a single JSON document.
#[derive(Debug, Clone)]
pub struct FsMetadataStore {
    path: PathBuf,
}

impl FsMetadataStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MetadataStore for FsMetadataStore {
    async fn load(&self) -> StoreResult<Option<PersistedMetadata>> {
        let Some(bytes) = read_optional(&self.path).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                key: METADATA_STORE_NAME.to_string(),
                message: e.to_string(),
            })
    }

    async fn save(&self, metadata: &PersistedMetadata) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(metadata)?;
        write_atomic(&self.path, &json).await
    }
}

/// One JSON file per photo id.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    dir: PathBuf,
}

impl FsBlobStore {
    /// Open the blob directory, creating it and clearing stale temp files.
    pub async fn open(dir: PathBuf) -> StoreResult<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if name.to_string_lossy().ends_with(TEMP_SUFFIX) {
                tracing::debug!("Removing stale temp file {:?}", name);
                tokio::fs::remove_file(entry.path()).await?;
            }
        }
        Ok(Self { dir })
    }

    fn entry_path(&self, id: PhotoId) -> PathBuf {
        self.dir.join(format!("{id}.{ENTRY_EXTENSION}"))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get(&self, id: PhotoId) -> StoreResult<Option<DurableImageEntry>> {
        let Some(bytes) = read_optional(&self.entry_path(id)).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                key: id.to_string(),
                message: e.to_string(),
            })
    }

    async fn put(&self, entry: &DurableImageEntry) -> StoreResult<()> {
        let json = serde_json::to_vec(entry)?;
        write_atomic(&self.entry_path(entry.id), &json).await
    }

    async fn delete(&self, id: PhotoId) -> StoreResult<bool> {
        match tokio::fs::remove_file(self.entry_path(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self) -> StoreResult<Vec<PhotoId>> {
        let mut keys = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match stem.parse::<PhotoId>() {
                Ok(id) => keys.push(id),
                Err(_) => tracing::warn!("Ignoring unrecognized file in blob store: {:?}", path),
            }
        }
        Ok(keys)
    }
}
