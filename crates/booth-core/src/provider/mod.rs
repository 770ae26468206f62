//! Provider clients for remote generative models.
//!
//! Every backend implements the same capability traits and normalizes its
//! responses into an [`ImageBlob`] or a classified [`GenerateError`]. Each
//! `generate_*` call performs exactly one outbound request; retries belong to
//! the [`crate::executor::Executor`].

pub(crate) mod gemini;
pub(crate) mod huggingface;

pub use gemini::GeminiProvider;
pub use huggingface::HuggingFaceProvider;

use crate::config::ProviderConfig;
use crate::error::GenerateError;
use crate::types::{ImageBlob, ProviderKind};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::time::Duration;

/// A request to generate an image from a prompt and an optional input image.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    /// Full prompt text (non-empty, checked by the caller)
    pub prompt: String,
    /// Source image the prompt is applied to
    pub input: Option<ImageBlob>,
}

impl ImageRequest {
    pub fn new(prompt: impl Into<String>, input: Option<ImageBlob>) -> Self {
        Self {
            prompt: prompt.into(),
            input,
        }
    }
}

/// A request for a short text completion.
#[derive(Debug, Clone)]
pub struct TextRequest {
    pub prompt: String,
}

impl TextRequest {
    /// Build the request that asks for a two- or three-word title for a prompt.
    pub fn title_for(prompt_text: &str) -> Self {
        Self {
            prompt: format!(
                "Generate a very short, two or three-word title for the following prompt. \
                 Return only the title and nothing else. Prompt: \"{prompt_text}\""
            ),
        }
    }
}

/// Clean up a model-produced title: trim and drop double quotes.
pub fn clean_title(raw: &str) -> String {
    raw.replace('"', "").trim().to_string()
}

/// Image generation capability.
///
/// Uses `async_trait` because native async fn in trait is not object-safe
/// (we need `Arc<dyn ImageProvider>` for dynamic dispatch).
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Provider name for logging (e.g., "gemini", "huggingface").
    fn name(&self) -> &str;

    fn kind(&self) -> ProviderKind;

    /// Whether the credential this provider needs is present.
    fn is_configured(&self) -> bool;

    /// Generate one image. Performs exactly one outbound call.
    async fn generate_image(&self, request: &ImageRequest) -> Result<ImageBlob, GenerateError>;
}

/// Text generation capability (used for prompt titles).
#[async_trait]
pub trait TextProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Generate a text completion. Performs exactly one outbound call.
    async fn generate_text(&self, request: &TextRequest) -> Result<String, GenerateError>;
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok().filter(|v| !v.trim().is_empty())
    } else if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Factory that creates providers from configuration.
pub struct ProviderFactory;

impl ProviderFactory {
    /// Create the image provider for `kind`.
    ///
    /// `credential` is the caller-supplied key; providers that read their key
    /// from ambient configuration ignore it. A missing key is not an error
    /// here: the provider fails fast with `CredentialMissing` on first use.
    pub fn image(
        kind: ProviderKind,
        config: &ProviderConfig,
        credential: Option<&str>,
    ) -> Box<dyn ImageProvider> {
        match kind {
            ProviderKind::Gemini => Box::new(Self::gemini(config)),
            ProviderKind::HuggingFace => {
                let cfg = &config.huggingface;
                let key = credential
                    .map(String::from)
                    .or_else(|| resolve_env_var(&cfg.api_key));
                Box::new(HuggingFaceProvider::new(
                    &cfg.endpoint,
                    &cfg.model,
                    key.as_deref(),
                ))
            }
        }
    }

    /// Create the text provider used for prompt titles.
    pub fn text(config: &ProviderConfig) -> Box<dyn TextProvider> {
        Box::new(Self::gemini(config))
    }

    fn gemini(config: &ProviderConfig) -> GeminiProvider {
        let cfg = &config.gemini;
        GeminiProvider::new(
            &cfg.endpoint,
            resolve_env_var(&cfg.api_key).as_deref(),
            &cfg.image_model,
            &cfg.text_model,
        )
    }
}

/// Classify a non-success HTTP status.
///
/// 429 and 5xx are transient; everything else (auth, bad request, missing
/// model) is fatal.
pub(crate) fn classify_status(
    provider: &str,
    status: StatusCode,
    retry_after: Option<Duration>,
    detail: &str,
) -> GenerateError {
    let code = status.as_u16();
    let message = format!("{provider} HTTP {status}: {detail}");
    if code == 429 || status.is_server_error() {
        GenerateError::Transient {
            message,
            status_code: Some(code),
            retry_after,
        }
    } else {
        GenerateError::Fatal {
            message,
            status_code: Some(code),
        }
    }
}

/// Classify a transport-level failure (no HTTP response).
pub(crate) fn classify_transport(provider: &str, error: &reqwest::Error) -> GenerateError {
    let message = format!("{provider} request failed: {error}");
    if error.is_timeout() || error.is_connect() || error.is_request() || error.is_body() {
        GenerateError::transient(message)
    } else {
        GenerateError::fatal(message)
    }
}

/// Parse a numeric `Retry-After` header (seconds).
pub(crate) fn retry_after_header(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(hint_duration)
}

/// Convert a server-supplied wait in seconds. Negative, non-finite, and
/// out-of-range values yield `None`.
pub(crate) fn hint_duration(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, RETRY_AFTER};

    #[test]
    fn test_title_request_embeds_prompt() {
        let request = TextRequest::title_for("turn me into a cartoon");
        assert!(request.prompt.contains("\"turn me into a cartoon\""));
        assert!(request.prompt.contains("two or three-word title"));
    }

    #[test]
    fn test_clean_title_strips_quotes() {
        assert_eq!(clean_title("  \"Cartoon Me\"\n"), "Cartoon Me");
    }

    #[test]
    fn test_resolve_env_var() {
        // Non-env-var strings pass through
        assert_eq!(resolve_env_var("plain-key"), Some("plain-key".to_string()));
        // Empty returns None
        assert_eq!(resolve_env_var(""), None);
        assert_eq!(resolve_env_var("   "), None);
        // Unset env var returns None
        assert_eq!(resolve_env_var("${DEFINITELY_NOT_SET_XYZ_123}"), None);
    }

    #[test]
    fn test_classify_rate_limit_is_transient() {
        let err = classify_status(
            "gemini",
            StatusCode::TOO_MANY_REQUESTS,
            Some(Duration::from_secs(2)),
            "slow down",
        );
        assert_eq!(
            err,
            GenerateError::Transient {
                message: "gemini HTTP 429 Too Many Requests: slow down".to_string(),
                status_code: Some(429),
                retry_after: Some(Duration::from_secs(2)),
            }
        );
    }

    #[test]
    fn test_classify_server_error_is_transient() {
        let err = classify_status("hf", StatusCode::SERVICE_UNAVAILABLE, None, "");
        assert!(matches!(
            err,
            GenerateError::Transient {
                status_code: Some(503),
                ..
            }
        ));
    }

    #[test]
    fn test_classify_auth_error_is_fatal() {
        let err = classify_status("gemini", StatusCode::UNAUTHORIZED, None, "bad key");
        assert!(matches!(
            err,
            GenerateError::Fatal {
                status_code: Some(401),
                ..
            }
        ));
        let err = classify_status("gemini", StatusCode::BAD_REQUEST, None, "bad body");
        assert!(matches!(err, GenerateError::Fatal { .. }));
    }

    #[test]
    fn test_retry_after_header_seconds() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after_header(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("3"));
        assert_eq!(retry_after_header(&headers), Some(Duration::from_secs(3)));

        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(retry_after_header(&headers), None);
    }

    #[test]
    fn test_retry_after_header_out_of_range() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("1e20"));
        assert_eq!(retry_after_header(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("-5"));
        assert_eq!(retry_after_header(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("NaN"));
        assert_eq!(retry_after_header(&headers), None);

        assert_eq!(hint_duration(0.25), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_factory_builds_selected_kind() {
        let config = ProviderConfig::default();
        let gemini = ProviderFactory::image(ProviderKind::Gemini, &config, None);
        assert_eq!(gemini.kind(), ProviderKind::Gemini);

        let hf = ProviderFactory::image(ProviderKind::HuggingFace, &config, Some("  hf_key  "));
        assert_eq!(hf.kind(), ProviderKind::HuggingFace);
        assert!(hf.is_configured());

        let hf = ProviderFactory::image(ProviderKind::HuggingFace, &config, None);
        assert!(!hf.is_configured());
    }
}
