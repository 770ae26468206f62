//! Sub-configuration structs with their defaults.

use crate::types::ProviderKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the metadata and blob stores
    pub data_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("~/.booth/data"),
        }
    }
}

/// Timeout and retry policy applied to every provider call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,

    /// Total attempts per logical call
    pub max_retries: u32,

    /// Base backoff delay in milliseconds (doubled per attempt)
    pub base_delay_ms: u64,

    /// Upper bound on a single exponential backoff delay
    pub max_delay_ms: u64,

    /// Upper bound on a provider-supplied retry-after hint
    pub max_hint_delay_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 123_333,
            max_retries: 5,
            base_delay_ms: 1_233,
            max_delay_ms: 30_000,
            max_hint_delay_ms: 15_000,
        }
    }
}

/// Per-class concurrency caps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Simultaneous image generation calls
    pub image_slots: usize,

    /// Simultaneous text generation calls
    pub text_slots: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            image_slots: 2,
            text_slots: 4,
        }
    }
}

/// Provider selection and per-provider settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider used for new captures
    pub selected: ProviderKind,

    /// Gemini configuration (image + title generation)
    pub gemini: GeminiConfig,

    /// Hugging Face configuration (image generation only)
    pub huggingface: HuggingFaceConfig,
}

/// Gemini configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// API key, or `${ENV_VAR}` reference
    pub api_key: String,

    /// API base URL
    pub endpoint: String,

    /// Model used for image generation
    pub image_model: String,

    /// Model used for prompt titles
    pub text_model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: "${GEMINI_API_KEY}".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            image_model: "gemini-2.5-flash-image".to_string(),
            text_model: "gemini-2.5-flash".to_string(),
        }
    }
}

/// Hugging Face Inference API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HuggingFaceConfig {
    /// Optional stored key; usually supplied by the caller at runtime
    pub api_key: String,

    /// Inference API base URL
    pub endpoint: String,

    /// Model repository id
    pub model: String,
}

impl Default for HuggingFaceConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: "https://api-inference.huggingface.co/models".to_string(),
            model: "stabilityai/stable-diffusion-xl-base-1.0".to_string(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
