//! Startup reconciliation between the metadata and blob stores.
//!
//! A blob entry survives only if it is complete (input and output) and its id
//! is listed in the metadata's known ids. Input-only remnants of interrupted
//! generations and entries of deleted photos are removed; known ids without a
//! surviving entry are pruned.
//!
//! When the metadata record is missing or unreadable the known ids cannot be
//! trusted, so every complete entry is kept and the id list is rebuilt from
//! the entries, newest capture first.

use super::{BlobStore, MetadataStore};
use crate::error::{StoreError, StoreResult};
use crate::types::{DurableImageEntry, PersistedMetadata, PhotoId};
use std::collections::{HashMap, HashSet};

/// What reconciliation changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Entries kept
    pub kept: usize,
    /// Entries deleted because they had no output (or were unreadable)
    pub removed_incomplete: usize,
    /// Complete entries deleted because no known id referenced them
    pub removed_unknown: usize,
    /// Known ids dropped because their entry was missing or removed
    pub pruned_ids: usize,
    /// Known ids were rebuilt from the entries
    pub rebuilt: bool,
}

/// The reconciled durable state.
#[derive(Debug, Clone)]
pub struct Reconciled {
    /// Metadata with `known_ids` matching `entries`
    pub metadata: PersistedMetadata,
    /// Surviving entries, most recent first
    pub entries: Vec<DurableImageEntry>,
    pub report: ReconcileReport,
}

/// Reconcile both stores and return the surviving state.
pub async fn reconcile(
    metadata_store: &dyn MetadataStore,
    blobs: &dyn BlobStore,
) -> StoreResult<Reconciled> {
    let mut report = ReconcileReport::default();
    let mut corrupt_metadata = false;
    let original = match metadata_store.load().await {
        Ok(Some(metadata)) => metadata,
        Ok(None) => {
            report.rebuilt = true;
            PersistedMetadata::default()
        }
        Err(StoreError::Corrupt { key, message }) => {
            tracing::warn!(
                "Metadata record {key} is unreadable ({message}); rebuilding from stored photos"
            );
            report.rebuilt = true;
            corrupt_metadata = true;
            PersistedMetadata::default()
        }
        Err(e) => return Err(e),
    };
    let known: HashSet<PhotoId> = original.known_ids.iter().copied().collect();
    let mut complete: HashMap<PhotoId, DurableImageEntry> = HashMap::new();

    for id in blobs.keys().await? {
        let entry = match blobs.get(id).await {
            Ok(entry) => entry,
            Err(StoreError::Corrupt { message, .. }) => {
                tracing::warn!("Blob entry {id} is unreadable: {message}");
                None
            }
            Err(e) => return Err(e),
        };

        match entry {
            Some(entry) if entry.id == id && entry.is_complete() => {
                if report.rebuilt || known.contains(&id) {
                    complete.insert(id, entry);
                } else {
                    tracing::debug!("Removing unreferenced entry {id}");
                    blobs.delete(id).await?;
                    report.removed_unknown += 1;
                }
            }
            _ => {
                tracing::debug!("Removing incomplete entry {id}");
                blobs.delete(id).await?;
                report.removed_incomplete += 1;
            }
        }
    }

    let entries = if report.rebuilt {
        let mut entries: Vec<DurableImageEntry> = complete.into_values().collect();
        entries.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
        entries
    } else {
        let mut entries = Vec::with_capacity(complete.len());
        for id in &original.known_ids {
            if let Some(entry) = complete.remove(id) {
                entries.push(entry);
            }
        }
        entries
    };
    report.kept = entries.len();
    report.pruned_ids = original.known_ids.len().saturating_sub(entries.len());

    let metadata = PersistedMetadata {
        known_ids: entries.iter().map(|e| e.id).collect(),
        ..original.clone()
    };
    if corrupt_metadata || metadata != original {
        metadata_store.save(&metadata).await?;
    }

    tracing::info!(
        kept = report.kept,
        removed_incomplete = report.removed_incomplete,
        removed_unknown = report.removed_unknown,
        pruned_ids = report.pruned_ids,
        rebuilt = report.rebuilt,
        "Reconciled durable store"
    );

    Ok(Reconciled {
        metadata,
        entries,
        report,
    })
}
