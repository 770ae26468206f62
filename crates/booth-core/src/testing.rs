//! Scriptable providers for unit tests.

use crate::error::GenerateError;
use crate::provider::{ImageProvider, ImageRequest, TextProvider, TextRequest};
use crate::types::{ImageBlob, ProviderKind};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type ImageResponseFn = Box<dyn Fn(u32) -> Result<ImageBlob, GenerateError> + Send + Sync>;
type TextResponseFn = Box<dyn Fn(u32) -> Result<String, GenerateError> + Send + Sync>;

pub(crate) fn output_blob(tag: u8) -> ImageBlob {
    ImageBlob::new(vec![0x89, b'P', b'N', b'G', tag], "image/png")
}

pub(crate) fn transient_error() -> GenerateError {
    GenerateError::Transient {
        message: "mock HTTP 503: overloaded".to_string(),
        status_code: Some(503),
        retry_after: None,
    }
}

/// Image provider whose responses come from a per-call factory.
pub(crate) struct MockProvider {
    /// Produces a response for each call index.
    response_fn: ImageResponseFn,
    /// Number of `generate_image` calls so far (shared for post-hoc assertions).
    pub call_count: Arc<AtomicU32>,
    /// Optional delay before returning.
    delay: Option<Duration>,
    /// (in_flight, max_concurrent)
    pub in_flight: (Arc<AtomicU32>, Arc<AtomicU32>),
    /// Every request seen, in call order.
    pub requests: Arc<Mutex<Vec<ImageRequest>>>,
}

impl MockProvider {
    pub fn new(
        response_fn: impl Fn(u32) -> Result<ImageBlob, GenerateError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            response_fn: Box::new(response_fn),
            call_count: Arc::new(AtomicU32::new(0)),
            delay: None,
            in_flight: (Arc::new(AtomicU32::new(0)), Arc::new(AtomicU32::new(0))),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every call returns an image whose last byte is the call index.
    pub fn success() -> Self {
        Self::new(|idx| Ok(output_blob(idx as u8)))
    }

    pub fn failing(error: GenerateError) -> Self {
        Self::new(move |_| Err(error.clone()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self) -> u32 {
        self.in_flight.1.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<ImageBlob, GenerateError> {
        let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let (in_flight, max_concurrent) = &self.in_flight;
        let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        max_concurrent.fetch_max(current, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        in_flight.fetch_sub(1, Ordering::SeqCst);

        (self.response_fn)(idx)
    }
}

/// Text provider for title generation.
pub(crate) struct MockTextProvider {
    response_fn: TextResponseFn,
    pub call_count: Arc<AtomicU32>,
}

impl MockTextProvider {
    pub fn new(
        response_fn: impl Fn(u32) -> Result<String, GenerateError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            response_fn: Box::new(response_fn),
            call_count: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn title(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    pub fn failing(error: GenerateError) -> Self {
        Self::new(move |_| Err(error.clone()))
    }

    pub fn calls(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    fn name(&self) -> &str {
        "mock-text"
    }

    async fn generate_text(&self, _request: &TextRequest) -> Result<String, GenerateError> {
        let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
        (self.response_fn)(idx)
    }
}
