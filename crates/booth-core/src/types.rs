//! Core data types shared by the lifecycle manager, providers, and stores.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Opaque, globally unique photo identifier. Assigned at capture, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhotoId(Uuid);

impl PhotoId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PhotoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PhotoId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Image bytes plus their MIME type.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageBlob {
    /// Raw encoded image bytes (stored as base64)
    #[serde(with = "base64_bytes")]
    pub bytes: Vec<u8>,
    /// MIME type (e.g., "image/jpeg", "image/png")
    pub mime_type: String,
}

impl fmt::Debug for ImageBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBlob")
            .field("len", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

impl ImageBlob {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Build a blob, detecting the MIME type from the magic bytes.
    ///
    /// Unknown formats default to `image/jpeg`, which is what cameras and
    /// canvas captures produce.
    pub fn sniff(bytes: Vec<u8>) -> Self {
        let mime_type = image::guess_format(&bytes)
            .map(|format| format.to_mime_type())
            .unwrap_or_else(|_| {
                tracing::debug!("Could not detect image format, defaulting to image/jpeg");
                "image/jpeg"
            });
        Self::new(bytes, mime_type)
    }

    /// Parse a `data:<mime>;base64,<payload>` URL.
    pub fn from_data_url(url: &str) -> Option<Self> {
        let rest = url.strip_prefix("data:")?;
        let (header, payload) = rest.split_once(',')?;
        let mime_type = header.strip_suffix(";base64")?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .ok()?;
        Some(Self::new(bytes, mime_type))
    }

    /// Base64 encoding of the bytes, as most provider APIs expect.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    /// Return a data URL suitable for embedding in a UI.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Usual file extension for the MIME type, `bin` if unknown.
    pub fn extension(&self) -> &'static str {
        image::ImageFormat::from_mime_type(&self.mime_type)
            .and_then(|format| format.extensions_str().first().copied())
            .unwrap_or("bin")
    }
}

mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}

/// Backend that generates the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google Gemini, credential from ambient configuration
    #[default]
    Gemini,
    /// Hugging Face Inference API, credential supplied by the caller
    HuggingFace,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::HuggingFace => "huggingface",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            "huggingface" | "hugging-face" | "hf" => Ok(ProviderKind::HuggingFace),
            other => Err(format!("Unknown provider: {other}")),
        }
    }
}

/// Where a photo is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoStatus {
    /// Id assigned, input not yet durable. Never visible, never persisted.
    Capturing,
    /// Input durable, generation in flight.
    Pending,
    /// Output durable.
    Ready,
    /// Generation failed; the record is removed from the visible set.
    Failed,
}

/// A photo as held in the published in-memory state.
///
/// Blobs are shared so that whole-state snapshot replacement stays cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoRecord {
    pub id: PhotoId,
    pub prompt_used: String,
    pub input: Arc<ImageBlob>,
    /// Present iff `status == Ready`
    pub output: Option<Arc<ImageBlob>>,
    pub provider: ProviderKind,
    pub status: PhotoStatus,
    /// Bumped every time the output is replaced, so consumers re-render
    pub version: u64,
    /// Volatile busy flag while a regeneration is in flight
    pub regenerating: bool,
}

impl PhotoRecord {
    /// True while the photo should be shown as busy.
    pub fn is_busy(&self) -> bool {
        self.status == PhotoStatus::Pending || self.regenerating
    }
}

/// A prompt the user has used before, with a short generated title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptHistoryEntry {
    pub id: String,
    pub title: String,
    pub prompt_text: String,
}

impl PromptHistoryEntry {
    pub fn new(title: impl Into<String>, prompt_text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            prompt_text: prompt_text.into(),
        }
    }
}

/// One record per photo in the blob store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurableImageEntry {
    pub id: PhotoId,
    pub input: ImageBlob,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<ImageBlob>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderKind>,
    /// Milliseconds since the Unix epoch at capture
    #[serde(default)]
    pub created_at_ms: u64,
}

impl DurableImageEntry {
    /// A freshly captured entry: input only.
    pub fn captured(id: PhotoId, input: ImageBlob, prompt_text: &str, provider: ProviderKind) -> Self {
        Self {
            id,
            input,
            output: None,
            prompt_text: Some(prompt_text.to_string()),
            provider: Some(provider),
            created_at_ms: now_ms(),
        }
    }

    /// Both input and a non-empty output are present.
    pub fn is_complete(&self) -> bool {
        !self.input.is_empty() && self.output.as_ref().is_some_and(|o| !o.is_empty())
    }
}

/// The durable subset of published state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedMetadata {
    pub prompt_history: Vec<PromptHistoryEntry>,
    pub last_prompt: String,
    /// Photo ids, most recent first
    pub known_ids: Vec<PhotoId>,
}

/// Concurrency class of a provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    /// Image generation (heavy, tight upstream limits)
    Image,
    /// Text generation (prompt titles)
    Text,
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationClass::Image => f.write_str("image"),
            OperationClass::Text => f.write_str("text"),
        }
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
