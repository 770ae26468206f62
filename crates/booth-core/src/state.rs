//! Published in-memory state and its single update path.
//!
//! Readers get immutable `Arc<BoothState>` snapshots; every mutation goes
//! through [`StateOwner::update`], which holds the channel's write lock while it
//! builds the next snapshot and swaps it in. No two mutations interleave.

use crate::types::{PersistedMetadata, PhotoId, PhotoRecord, PhotoStatus, PromptHistoryEntry};
use std::sync::Arc;
use tokio::sync::watch;

/// Everything the UI renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoothState {
    /// Visible photos, most recent first
    pub photos: Vec<PhotoRecord>,
    /// Prompt history, most recent first
    pub prompt_history: Vec<PromptHistoryEntry>,
    /// Prompt applied to the next capture
    pub current_prompt: String,
    /// Dismissible message for the last surfaced failure
    pub last_error: Option<String>,
    /// Startup reconciliation has completed
    pub rehydrated: bool,
}

impl BoothState {
    pub fn photo(&self, id: PhotoId) -> Option<&PhotoRecord> {
        self.photos.iter().find(|p| p.id == id)
    }

    pub(crate) fn photo_mut(&mut self, id: PhotoId) -> Option<&mut PhotoRecord> {
        self.photos.iter_mut().find(|p| p.id == id)
    }

    /// Remove a photo, returning whether it was present.
    pub(crate) fn remove_photo(&mut self, id: PhotoId) -> bool {
        let before = self.photos.len();
        self.photos.retain(|p| p.id != id);
        self.photos.len() != before
    }

    pub fn has_prompt(&self, prompt_text: &str) -> bool {
        self.prompt_history
            .iter()
            .any(|entry| entry.prompt_text == prompt_text)
    }

    /// Number of photos shown as busy.
    pub fn busy_count(&self) -> usize {
        self.photos.iter().filter(|p| p.is_busy()).count()
    }

    /// The durable subset of this state. Volatile fields are left out.
    pub fn durable_view(&self) -> PersistedMetadata {
        PersistedMetadata {
            prompt_history: self.prompt_history.clone(),
            last_prompt: self.current_prompt.clone(),
            known_ids: self
                .photos
                .iter()
                .filter(|p| matches!(p.status, PhotoStatus::Pending | PhotoStatus::Ready))
                .map(|p| p.id)
                .collect(),
        }
    }
}

/// Owner of the published state.
#[derive(Debug)]
pub struct StateOwner {
    tx: watch::Sender<Arc<BoothState>>,
}

impl Default for StateOwner {
    fn default() -> Self {
        Self::new(BoothState::default())
    }
}

impl StateOwner {
    pub fn new(initial: BoothState) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self { tx }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<BoothState> {
        self.tx.borrow().clone()
    }

    /// Receive every published snapshot from now on.
    pub fn subscribe(&self) -> watch::Receiver<Arc<BoothState>> {
        self.tx.subscribe()
    }

    /// Apply `f` to a copy of the current state and publish the result.
    ///
    /// Subscribers holding an older snapshot keep it unchanged.
    pub fn update<R, F>(&self, f: F) -> R
    where
        R: Default,
        F: FnOnce(&mut BoothState) -> R,
    {
        let mut result = R::default();
        self.tx.send_modify(|current| {
            let mut next = BoothState::clone(current);
            result = f(&mut next);
            *current = Arc::new(next);
        });
        result
    }
}
