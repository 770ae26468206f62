//! Photo lifecycle manager.
//!
//! [`Booth`] is the only writer of photo records and durable entries. Every
//! capture moves through `Capturing → Pending → Ready`, or is rolled back:
//!
//! ```text
//! capture(img) → put input → Pending (front of list) → save metadata
//!              → title (text class) ┐
//!              → image (image class)┴→ put output → Ready
//!                                  └→ failure: delete entry, drop record, save metadata
//! ```
//!
//! Nothing is serviced before [`Booth::rehydrate`] has reconciled the durable
//! store with the published state.

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::error::{BoothError, Result};
use crate::executor::{CallFailure, Executor, RetryPolicy};
use crate::presets;
use crate::provider::{
    clean_title, ImageProvider, ImageRequest, ProviderFactory, TextProvider, TextRequest,
};
use crate::state::{BoothState, StateOwner};
use crate::store::{open_fs, reconcile, BlobStore, MetadataStore};
use crate::types::{
    DurableImageEntry, ImageBlob, OperationClass, PhotoId, PhotoRecord, PhotoStatus,
    PromptHistoryEntry, ProviderKind,
};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

/// How a capture ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The photo is `Ready` with a durable output.
    Ready(PhotoId),
    /// The capture was cancelled or its photo deleted mid-flight. Nothing of it remains.
    Cancelled(PhotoId),
}

impl CaptureOutcome {
    pub fn id(&self) -> PhotoId {
        match self {
            CaptureOutcome::Ready(id) | CaptureOutcome::Cancelled(id) => *id,
        }
    }
}

/// How a regeneration ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegenerateOutcome {
    /// The durable output was replaced; consumers re-render at `version`.
    Updated { version: u64 },
    /// Cancelled, or the photo was deleted mid-flight.
    Cancelled,
}

/// A `Ready` photo with both blobs, for GIF assembly and export.
#[derive(Debug, Clone)]
pub struct ResolvedPhoto {
    pub id: PhotoId,
    pub input: Arc<ImageBlob>,
    pub output: Arc<ImageBlob>,
}

/// One image provider per [`ProviderKind`].
struct ImageProviders {
    gemini: Arc<dyn ImageProvider>,
    huggingface: Arc<dyn ImageProvider>,
}

impl ImageProviders {
    fn get(&self, kind: ProviderKind) -> Arc<dyn ImageProvider> {
        match kind {
            ProviderKind::Gemini => self.gemini.clone(),
            ProviderKind::HuggingFace => self.huggingface.clone(),
        }
    }

    fn set(&mut self, provider: Arc<dyn ImageProvider>) {
        match provider.kind() {
            ProviderKind::Gemini => self.gemini = provider,
            ProviderKind::HuggingFace => self.huggingface = provider,
        }
    }
}

/// Wires stores, providers, and the call policy into a [`Booth`].
pub struct BoothBuilder {
    config: Config,
    metadata: Option<Arc<dyn MetadataStore>>,
    blobs: Option<Arc<dyn BlobStore>>,
    image_providers: Vec<Arc<dyn ImageProvider>>,
    text_provider: Option<Arc<dyn TextProvider>>,
    titles: bool,
    credential: Option<String>,
}

impl BoothBuilder {
    /// Use these stores instead of the filesystem stores under `data_dir`.
    pub fn with_stores(
        mut self,
        metadata: Arc<dyn MetadataStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        self.metadata = Some(metadata);
        self.blobs = Some(blobs);
        self
    }

    /// Register an image provider, replacing the built-in one of the same kind.
    pub fn with_image_provider(mut self, provider: Arc<dyn ImageProvider>) -> Self {
        self.image_providers.push(provider);
        self
    }

    pub fn with_text_provider(mut self, provider: Arc<dyn TextProvider>) -> Self {
        self.text_provider = Some(provider);
        self
    }

    /// Skip title generation for new prompts.
    pub fn without_titles(mut self) -> Self {
        self.titles = false;
        self
    }

    /// Caller-supplied credential for providers that need one.
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    pub async fn build(self) -> Result<Booth> {
        let BoothBuilder {
            config,
            metadata,
            blobs,
            image_providers,
            text_provider,
            titles,
            credential,
        } = self;
        config.validate()?;

        let (metadata, blobs): (Arc<dyn MetadataStore>, Arc<dyn BlobStore>) =
            match (metadata, blobs) {
                (Some(metadata), Some(blobs)) => (metadata, blobs),
                _ => {
                    let (fs_metadata, fs_blobs) = open_fs(&config.data_dir()).await?;
                    let metadata: Arc<dyn MetadataStore> = Arc::new(fs_metadata);
                    let blobs: Arc<dyn BlobStore> = Arc::new(fs_blobs);
                    (metadata, blobs)
                }
            };

        let mut providers = ImageProviders {
            gemini: Arc::from(ProviderFactory::image(
                ProviderKind::Gemini,
                &config.provider,
                None,
            )),
            huggingface: Arc::from(ProviderFactory::image(
                ProviderKind::HuggingFace,
                &config.provider,
                credential.as_deref(),
            )),
        };
        for provider in image_providers {
            providers.set(provider);
        }

        let text_provider = if titles {
            Some(text_provider.unwrap_or_else(|| Arc::from(ProviderFactory::text(&config.provider))))
        } else {
            None
        };

        tracing::debug!(
            "Booth ready: provider={}, image_slots={}, text_slots={}",
            config.provider.selected,
            config.concurrency.image_slots,
            config.concurrency.text_slots
        );

        Ok(Booth {
            selected: RwLock::new(config.provider.selected),
            dispatcher: Dispatcher::from(&config.concurrency),
            executor: Executor::new(RetryPolicy::from(&config.generation)),
            state: StateOwner::default(),
            metadata,
            blobs,
            providers: RwLock::new(providers),
            text_provider,
            credential: RwLock::new(credential),
            cancel: Mutex::new(CancellationToken::new()),
            persist_lock: Mutex::new(()),
            rehydrate_lock: Mutex::new(()),
            config,
        })
    }
}

/// The photo lifecycle manager.
pub struct Booth {
    config: Config,
    state: StateOwner,
    metadata: Arc<dyn MetadataStore>,
    blobs: Arc<dyn BlobStore>,
    providers: RwLock<ImageProviders>,
    text_provider: Option<Arc<dyn TextProvider>>,
    selected: RwLock<ProviderKind>,
    credential: RwLock<Option<String>>,
    dispatcher: Dispatcher,
    executor: Executor,
    /// Token shared by every call started since the last `cancel_in_flight`
    cancel: Mutex<CancellationToken>,
    /// Serializes metadata saves so the newest snapshot is written last
    persist_lock: Mutex<()>,
    rehydrate_lock: Mutex<()>,
}

impl Booth {
    pub fn builder(config: Config) -> BoothBuilder {
        BoothBuilder {
            config,
            metadata: None,
            blobs: None,
            image_providers: Vec::new(),
            text_provider: None,
            titles: true,
            credential: None,
        }
    }

    /// Build with filesystem stores and built-in providers, then rehydrate.
    pub async fn open(config: Config) -> Result<Self> {
        let booth = Self::builder(config).build().await?;
        booth.rehydrate().await?;
        Ok(booth)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current published state.
    pub fn snapshot(&self) -> Arc<BoothState> {
        self.state.snapshot()
    }

    /// Receive every state published from now on.
    pub fn subscribe(&self) -> watch::Receiver<Arc<BoothState>> {
        self.state.subscribe()
    }

    /// Reconcile the durable store and publish the surviving photos.
    ///
    /// Runs once; later calls are no-ops.
    pub async fn rehydrate(&self) -> Result<()> {
        let _guard = self.rehydrate_lock.lock().await;
        if self.state.snapshot().rehydrated {
            tracing::debug!("Already rehydrated");
            return Ok(());
        }

        let reconciled = reconcile(self.metadata.as_ref(), self.blobs.as_ref()).await?;
        let fallback = self.selected_provider().await;
        let photos: Vec<PhotoRecord> = reconciled
            .entries
            .into_iter()
            .filter_map(|entry| {
                let output = entry.output?;
                Some(PhotoRecord {
                    id: entry.id,
                    prompt_used: entry.prompt_text.unwrap_or_default(),
                    input: Arc::new(entry.input),
                    output: Some(Arc::new(output)),
                    provider: entry.provider.unwrap_or(fallback),
                    status: PhotoStatus::Ready,
                    version: 0,
                    regenerating: false,
                })
            })
            .collect();
        let metadata = reconciled.metadata;

        tracing::info!(
            "Rehydrated {} photo(s), {} prompt(s) in history",
            photos.len(),
            metadata.prompt_history.len()
        );
        self.state.update(move |s| {
            *s = BoothState {
                photos,
                prompt_history: metadata.prompt_history,
                current_prompt: metadata.last_prompt,
                last_error: None,
                rehydrated: true,
            };
        });
        Ok(())
    }

    /// Capture `input` under the current prompt and generate its output.
    ///
    /// A title for a new prompt is requested alongside the image; its failure
    /// is logged and never fails the photo. On failure every trace of the
    /// photo is rolled back before the error is returned.
    pub async fn capture(&self, input: ImageBlob) -> Result<CaptureOutcome> {
        self.ensure_rehydrated()?;
        let prompt = self.state.snapshot().current_prompt.clone();
        if prompt.trim().is_empty() {
            tracing::warn!("Capture ignored: no prompt set");
            return Err(BoothError::EmptyPrompt);
        }
        if input.is_empty() {
            return Err(BoothError::EmptyImage);
        }

        let kind = self.selected_provider().await;
        let provider = self.providers.read().await.get(kind);
        let cancel = self.cancel_token().await;

        let id = PhotoId::new();
        log_transition(id, PhotoStatus::Capturing);
        let entry = DurableImageEntry::captured(id, input, &prompt, kind);
        self.blobs.put(&entry).await?;

        let record = PhotoRecord {
            id,
            prompt_used: prompt.clone(),
            input: Arc::new(entry.input.clone()),
            output: None,
            provider: kind,
            status: PhotoStatus::Pending,
            version: 0,
            regenerating: false,
        };
        self.state.update(|s| s.photos.insert(0, record));
        if let Err(e) = self.persist_metadata().await {
            self.rollback_capture(id).await;
            self.record_error(&e);
            return Err(e);
        }
        log_transition(id, PhotoStatus::Pending);

        let request = ImageRequest::new(prompt.as_str(), Some(entry.input.clone()));
        let label = format!("image {id}");
        let image = async {
            let result = self
                .generate_image(provider.as_ref(), &request, &cancel, &label)
                .await;
            self.settle_capture(entry, result).await
        };
        // The photo settles as soon as its image does; the title only
        // delays the return.
        let ((), outcome) = tokio::join!(self.generate_title(&prompt, &cancel), image);
        outcome
    }

    async fn settle_capture(
        &self,
        entry: DurableImageEntry,
        result: std::result::Result<Option<ImageBlob>, CallFailure>,
    ) -> Result<CaptureOutcome> {
        let id = entry.id;
        match result {
            Ok(Some(output)) => self.finish_capture(entry, output).await,
            Ok(None) => {
                self.rollback_capture(id).await;
                tracing::info!("Capture of photo {id} cancelled");
                Ok(CaptureOutcome::Cancelled(id))
            }
            Err(failure) => {
                log_transition(id, PhotoStatus::Failed);
                self.rollback_capture(id).await;
                Err(self.surface(id, failure))
            }
        }
    }

    async fn finish_capture(
        &self,
        mut entry: DurableImageEntry,
        output: ImageBlob,
    ) -> Result<CaptureOutcome> {
        let id = entry.id;
        if self.state.snapshot().photo(id).is_none() {
            tracing::info!("Photo {id} was deleted while generating; discarding output");
            self.discard_entry(id).await;
            return Ok(CaptureOutcome::Cancelled(id));
        }

        entry.output = Some(output);
        if let Err(e) = self.blobs.put(&entry).await {
            log_transition(id, PhotoStatus::Failed);
            self.rollback_capture(id).await;
            let err = BoothError::from(e);
            self.record_error(&err);
            return Err(err);
        }

        let output = entry.output.map(Arc::new);
        let visible = self.state.update(|s| match s.photo_mut(id) {
            Some(photo) => {
                photo.output = output;
                photo.status = PhotoStatus::Ready;
                true
            }
            None => false,
        });
        if !visible {
            tracing::info!("Photo {id} was deleted while generating; discarding output");
            self.discard_entry(id).await;
            return Ok(CaptureOutcome::Cancelled(id));
        }

        log_transition(id, PhotoStatus::Ready);
        Ok(CaptureOutcome::Ready(id))
    }

    /// Undo a capture: drop the record, its durable entry, and its known id.
    async fn rollback_capture(&self, id: PhotoId) {
        let removed = self.state.update(|s| s.remove_photo(id));
        self.discard_entry(id).await;
        if removed {
            if let Err(e) = self.persist_metadata().await {
                tracing::warn!("Failed to save metadata while rolling back photo {id}: {e}");
            }
        }
    }

    /// Delete a blob entry that must not survive. A failure here is left for
    /// the next reconciliation to clean up.
    async fn discard_entry(&self, id: PhotoId) {
        if let Err(e) = self.blobs.delete(id).await {
            tracing::warn!("Failed to delete entry for photo {id}: {e}");
        }
    }

    /// Generate a fresh output for a stored photo.
    ///
    /// Input, prompt, and provider are read from the durable store. On failure
    /// the previous output is left exactly as it was.
    pub async fn regenerate(&self, id: PhotoId) -> Result<RegenerateOutcome> {
        self.ensure_rehydrated()?;
        let Some(mut entry) = self.blobs.get(id).await? else {
            return Err(BoothError::NotFound { id });
        };

        let prompt = match entry.prompt_text.as_deref() {
            Some(text) if !text.trim().is_empty() => text.to_string(),
            _ => self.state.snapshot().current_prompt.clone(),
        };
        if prompt.trim().is_empty() {
            return Err(BoothError::EmptyPrompt);
        }
        let kind = match entry.provider {
            Some(kind) => kind,
            None => self.selected_provider().await,
        };
        let provider = self.providers.read().await.get(kind);
        let cancel = self.cancel_token().await;

        tracing::info!("Regenerating photo {id} with {kind}");
        self.set_regenerating(id, true);
        let request = ImageRequest::new(prompt, Some(entry.input.clone()));
        let label = format!("regenerate {id}");
        let output = match self
            .generate_image(provider.as_ref(), &request, &cancel, &label)
            .await
        {
            Ok(Some(output)) => output,
            Ok(None) => {
                self.set_regenerating(id, false);
                tracing::info!("Regeneration of photo {id} cancelled");
                return Ok(RegenerateOutcome::Cancelled);
            }
            Err(failure) => {
                self.set_regenerating(id, false);
                return Err(self.surface(id, failure));
            }
        };

        if self.state.snapshot().photo(id).is_none() {
            tracing::info!("Photo {id} was deleted while regenerating; discarding output");
            return Ok(RegenerateOutcome::Cancelled);
        }

        entry.output = Some(output);
        if let Err(e) = self.blobs.put(&entry).await {
            self.set_regenerating(id, false);
            let err = BoothError::from(e);
            self.record_error(&err);
            return Err(err);
        }

        let output = entry.output.map(Arc::new);
        let version = self.state.update(|s| {
            let photo = s.photo_mut(id)?;
            photo.output = output;
            photo.status = PhotoStatus::Ready;
            photo.regenerating = false;
            photo.version += 1;
            Some(photo.version)
        });
        match version {
            Some(version) => {
                tracing::info!("Photo {id} regenerated (version {version})");
                Ok(RegenerateOutcome::Updated { version })
            }
            None => {
                tracing::info!("Photo {id} was deleted while regenerating; discarding output");
                self.discard_entry(id).await;
                Ok(RegenerateOutcome::Cancelled)
            }
        }
    }

    fn set_regenerating(&self, id: PhotoId, regenerating: bool) {
        self.state.update(|s| {
            if let Some(photo) = s.photo_mut(id) {
                photo.regenerating = regenerating;
            }
        });
    }

    /// Remove a photo and its durable entry. Deleting an absent id is a no-op.
    ///
    /// The known ids are saved even when the entry cannot be deleted, so the
    /// photo does not come back on the next start.
    pub async fn delete(&self, id: PhotoId) -> Result<()> {
        self.ensure_rehydrated()?;
        let removed = self.state.update(|s| s.remove_photo(id));
        let deleted = self.blobs.delete(id).await;
        if removed {
            self.persist_metadata().await?;
        }
        let deleted = deleted?;

        if removed || deleted {
            tracing::info!("Deleted photo {id}");
        } else {
            tracing::debug!("Delete of {id}: nothing to do");
        }
        Ok(())
    }

    /// Prompt history, most recent first.
    pub fn prompt_history(&self) -> Result<Vec<PromptHistoryEntry>> {
        self.ensure_rehydrated()?;
        Ok(self.state.snapshot().prompt_history.clone())
    }

    /// Set the prompt applied to the next capture. Persisted as the last prompt.
    pub async fn set_prompt(&self, text: impl Into<String>) -> Result<()> {
        self.ensure_rehydrated()?;
        let text = text.into();
        self.state.update(|s| s.current_prompt = text);
        self.persist_metadata().await
    }

    /// Make a history entry's prompt current. Returns the prompt text.
    pub async fn use_history_entry(&self, entry_id: &str) -> Result<String> {
        self.ensure_rehydrated()?;
        let prompt = self
            .state
            .snapshot()
            .prompt_history
            .iter()
            .find(|entry| entry.id == entry_id)
            .map(|entry| entry.prompt_text.clone())
            .ok_or_else(|| BoothError::HistoryEntryNotFound {
                id: entry_id.to_string(),
            })?;
        self.set_prompt(prompt.clone()).await?;
        Ok(prompt)
    }

    /// Make a preset's prompt current. The custom preset keeps the current
    /// prompt. Returns the prompt now in effect.
    pub async fn apply_preset(&self, key: &str) -> Result<String> {
        self.ensure_rehydrated()?;
        let preset = presets::find(key).ok_or_else(|| BoothError::UnknownPreset {
            name: key.to_string(),
        })?;
        if preset.is_custom() {
            return Ok(self.state.snapshot().current_prompt.clone());
        }
        self.set_prompt(preset.prompt).await?;
        Ok(preset.prompt.to_string())
    }

    /// Every `Ready`, non-busy photo in display order.
    pub fn ready_photos(&self) -> Result<Vec<ResolvedPhoto>> {
        self.ensure_rehydrated()?;
        Ok(self
            .state
            .snapshot()
            .photos
            .iter()
            .filter(|photo| photo.status == PhotoStatus::Ready && !photo.is_busy())
            .filter_map(|photo| {
                Some(ResolvedPhoto {
                    id: photo.id,
                    input: photo.input.clone(),
                    output: photo.output.clone()?,
                })
            })
            .collect())
    }

    /// Clear the last surfaced error message.
    pub fn dismiss_error(&self) {
        self.state.update(|s| s.last_error = None);
    }

    /// Cancel every call in flight. Cancelled captures roll back quietly.
    ///
    /// Cancellation drops the pending request future; whether the remote
    /// service stops work is up to the service.
    pub async fn cancel_in_flight(&self) {
        let mut token = self.cancel.lock().await;
        token.cancel();
        *token = CancellationToken::new();
        tracing::info!("Cancelled in-flight generation calls");
    }

    /// Replace the caller-supplied credential and rebuild the providers that use it.
    pub async fn set_credential(&self, credential: Option<String>) {
        let provider = ProviderFactory::image(
            ProviderKind::HuggingFace,
            &self.config.provider,
            credential.as_deref(),
        );
        self.providers.write().await.set(Arc::from(provider));
        *self.credential.write().await = credential;
    }

    pub async fn has_credential(&self) -> bool {
        self.credential.read().await.is_some()
    }

    /// Provider used by later captures.
    pub async fn select_provider(&self, kind: ProviderKind) {
        *self.selected.write().await = kind;
        tracing::debug!("Selected provider {kind}");
    }

    pub async fn selected_provider(&self) -> ProviderKind {
        *self.selected.read().await
    }

    /// Whether `kind` has the credential it needs.
    pub async fn is_provider_configured(&self, kind: ProviderKind) -> bool {
        self.providers.read().await.get(kind).is_configured()
    }

    fn ensure_rehydrated(&self) -> Result<()> {
        if self.state.snapshot().rehydrated {
            Ok(())
        } else {
            Err(BoothError::NotRehydrated)
        }
    }

    async fn cancel_token(&self) -> CancellationToken {
        self.cancel.lock().await.clone()
    }

    async fn generate_image(
        &self,
        provider: &dyn ImageProvider,
        request: &ImageRequest,
        cancel: &CancellationToken,
        label: &str,
    ) -> std::result::Result<Option<ImageBlob>, CallFailure> {
        let attempt = move || provider.generate_image(request);
        self.dispatcher
            .submit(
                OperationClass::Image,
                self.executor.execute(label, cancel, attempt),
            )
            .await
    }

    /// Request a title for `prompt` if it is not in the history yet.
    async fn generate_title(&self, prompt: &str, cancel: &CancellationToken) {
        let Some(provider) = self.text_provider.as_deref() else {
            return;
        };
        if self.state.snapshot().has_prompt(prompt) {
            return;
        }

        let request = TextRequest::title_for(prompt);
        let request = &request;
        let attempt = move || provider.generate_text(request);
        let result = self
            .dispatcher
            .submit(
                OperationClass::Text,
                self.executor.execute("title", cancel, attempt),
            )
            .await;

        let title = match result {
            Ok(Some(raw)) => clean_title(&raw),
            Ok(None) => return,
            Err(failure) => {
                tracing::warn!(
                    "Failed to generate prompt title after {} attempt(s): {}",
                    failure.attempts,
                    failure.error
                );
                return;
            }
        };
        if title.is_empty() {
            tracing::warn!("Title model returned an empty title");
            return;
        }

        let added = self.state.update(|s| {
            if s.has_prompt(prompt) {
                return false;
            }
            s.prompt_history
                .insert(0, PromptHistoryEntry::new(title.as_str(), prompt));
            true
        });
        if added {
            tracing::debug!("New prompt titled \"{title}\"");
            if let Err(e) = self.persist_metadata().await {
                tracing::warn!("Failed to save prompt history: {e}");
            }
        }
    }

    /// Save the durable view of the current state.
    async fn persist_metadata(&self) -> Result<()> {
        let _guard = self.persist_lock.lock().await;
        let view = self.state.snapshot().durable_view();
        self.metadata.save(&view).await?;
        Ok(())
    }

    /// Turn a failed call into a surfaced error.
    fn surface(&self, photo_id: PhotoId, failure: CallFailure) -> BoothError {
        let err = BoothError::Generation {
            photo_id,
            attempts: failure.attempts,
            source: failure.error,
        };
        self.record_error(&err);
        err
    }

    fn record_error(&self, err: &BoothError) {
        tracing::error!("{err}");
        let message = err.to_string();
        self.state.update(|s| s.last_error = Some(message));
    }
}

fn log_transition(id: PhotoId, status: PhotoStatus) {
    tracing::debug!(photo = %id, ?status, "Photo transition");
}
