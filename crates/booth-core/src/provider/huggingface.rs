//! Hugging Face Inference API provider.
//!
//! Text-to-image only: the prompt is posted as `inputs` and the response body
//! is the raw image. The API key is supplied by the caller, never read from
//! the environment implicitly.

use super::{
    classify_status, classify_transport, hint_duration, retry_after_header, ImageProvider,
    ImageRequest,
};
use crate::error::GenerateError;
use crate::types::{ImageBlob, ProviderKind};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Hugging Face provider for hosted diffusion models.
pub struct HuggingFaceProvider {
    url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HuggingFaceProvider {
    pub fn new(endpoint: &str, model: &str, api_key: Option<&str>) -> Self {
        Self {
            url: format!("{}/{}", endpoint.trim_end_matches('/'), model),
            model: model.to_string(),
            api_key: api_key
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
}

/// Error body returned by the Inference API.
#[derive(Deserialize)]
struct InferenceError {
    error: Option<String>,
    /// Seconds until a cold model finishes loading
    estimated_time: Option<f64>,
}

/// Classify a non-success response body.
///
/// A cold model answers with "is currently loading" and an estimated wait;
/// that becomes a transient error carrying the wait as a retry hint.
fn classify_error_body(
    status: StatusCode,
    header_retry: Option<Duration>,
    body: &str,
) -> GenerateError {
    let Ok(parsed) = serde_json::from_str::<InferenceError>(body) else {
        return classify_status("Hugging Face", status, header_retry, body);
    };

    let message = parsed.error.unwrap_or_else(|| "Unknown error".to_string());
    if message.contains("is currently loading") {
        let retry_after = parsed
            .estimated_time
            .and_then(hint_duration)
            .or(header_retry);
        return GenerateError::Transient {
            message: format!("Hugging Face model is loading: {message}"),
            status_code: Some(status.as_u16()),
            retry_after,
        };
    }

    classify_status("Hugging Face", status, header_retry, &message)
}

#[async_trait]
impl ImageProvider for HuggingFaceProvider {
    fn name(&self) -> &str {
        "huggingface"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::HuggingFace
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<ImageBlob, GenerateError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| GenerateError::CredentialMissing {
                provider: "Hugging Face".to_string(),
            })?;
        let start = Instant::now();

        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .header("x-use-cache", "false")
            .json(&InferenceRequest {
                inputs: &request.prompt,
            })
            .send()
            .await
            .map_err(|e| classify_transport("Hugging Face", &e))?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = retry_after_header(resp.headers());
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_error_body(status, retry_after, &text));
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .unwrap_or_default();
        if !content_type.starts_with("image/") {
            return Err(GenerateError::NoResult {
                reason: format!("Hugging Face did not return an image ({content_type})"),
            });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| classify_transport("Hugging Face", &e))?;
        if bytes.is_empty() {
            return Err(GenerateError::NoResult {
                reason: "empty image payload".to_string(),
            });
        }

        tracing::debug!(
            model = %self.model,
            latency_ms = start.elapsed().as_millis() as u64,
            bytes = bytes.len(),
            "Hugging Face image generated"
        );
        Ok(ImageBlob::new(bytes.to_vec(), content_type))
    }
}
