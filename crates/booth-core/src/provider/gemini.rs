//! Gemini provider using the `generateContent` API.
//!
//! Reads its API key from ambient configuration. Serves both image
//! generation (inline input image + prompt, image-only response modality) and
//! the short text completions used for prompt titles.

use super::{
    classify_status, classify_transport, retry_after_header, ImageProvider, ImageRequest,
    TextProvider, TextRequest,
};
use crate::error::GenerateError;
use crate::types::{ImageBlob, ProviderKind};
use async_trait::async_trait;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Instant;

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
    "HARM_CATEGORY_HARASSMENT",
];

/// Gemini provider.
pub struct GeminiProvider {
    endpoint: String,
    api_key: Option<String>,
    image_model: String,
    text_model: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(endpoint: &str, api_key: Option<&str>, image_model: &str, text_model: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(String::from),
            image_model: image_model.to_string(),
            text_model: text_model.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn api_key(&self) -> Result<&str, GenerateError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| GenerateError::CredentialMissing {
                provider: "Gemini".to_string(),
            })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        model: &str,
        body: &GenerateContentRequest,
    ) -> Result<T, GenerateError> {
        let api_key = self.api_key()?;
        let url = format!("{}/models/{}:generateContent", self.endpoint, model);

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| classify_transport("Gemini", &e))?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = retry_after_header(resp.headers());
            let text = resp.text().await.unwrap_or_default();
            return Err(classify_status("Gemini", status, retry_after, &text));
        }

        resp.json().await.map_err(|e| {
            GenerateError::fatal(format!("Failed to parse Gemini response: {e}"))
        })
    }
}

// --- Request types ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    safety_settings: Vec<SafetySetting>,
}

#[derive(Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
}

#[derive(Serialize)]
struct SafetySetting {
    category: String,
    threshold: String,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

// --- Response types ---

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    inline_data: Option<InlineData>,
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
    }

    /// Parts of the first candidate, or the reason there are none.
    fn first_parts(&self) -> Result<&[ResponsePart], GenerateError> {
        if let Some(reason) = self.block_reason() {
            return Err(GenerateError::ContentBlocked {
                reason: reason.to_string(),
            });
        }

        let candidate = self.candidates.first();
        match candidate.and_then(|c| c.content.as_ref()) {
            Some(content) if !content.parts.is_empty() => Ok(&content.parts),
            _ => {
                let reason = candidate
                    .and_then(|c| c.finish_reason.as_deref())
                    .filter(|r| *r != "STOP");
                Err(match reason {
                    Some("NO_IMAGE") => GenerateError::NoResult {
                        reason: "the model could not create an image for this prompt; \
                                 try rewording it"
                            .to_string(),
                    },
                    Some("SAFETY") | Some("PROHIBITED_CONTENT") | Some("IMAGE_SAFETY") => {
                        GenerateError::ContentBlocked {
                            reason: reason.unwrap_or_default().to_string(),
                        }
                    }
                    Some(other) => GenerateError::NoResult {
                        reason: format!("generation stopped: {other}"),
                    },
                    None => GenerateError::NoResult {
                        reason: "no valid candidates in response".to_string(),
                    },
                })
            }
        }
    }

    fn into_image(self) -> Result<ImageBlob, GenerateError> {
        let inline = self
            .first_parts()?
            .iter()
            .find_map(|p| p.inline_data.as_ref())
            .ok_or_else(|| GenerateError::NoResult {
                reason: "no inline image data in response".to_string(),
            })?;

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&inline.data)
            .map_err(|e| GenerateError::fatal(format!("Gemini returned invalid base64: {e}")))?;
        if bytes.is_empty() {
            return Err(GenerateError::NoResult {
                reason: "empty image payload".to_string(),
            });
        }

        let mime_type = if inline.mime_type.is_empty() {
            "image/png"
        } else {
            inline.mime_type.as_str()
        };
        Ok(ImageBlob::new(bytes, mime_type))
    }

    fn into_text(self) -> Result<String, GenerateError> {
        let text = self
            .first_parts()?
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(GenerateError::NoResult {
                reason: "no text in response".to_string(),
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl ImageProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<ImageBlob, GenerateError> {
        let start = Instant::now();

        let mut parts = Vec::with_capacity(2);
        if let Some(input) = &request.input {
            parts.push(RequestPart {
                inline_data: Some(InlineData {
                    mime_type: input.mime_type.clone(),
                    data: input.to_base64(),
                }),
                text: None,
            });
        }
        parts.push(RequestPart {
            inline_data: None,
            text: Some(request.prompt.clone()),
        });

        let body = GenerateContentRequest {
            contents: vec![RequestContent { parts }],
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["IMAGE".to_string()],
            }),
            safety_settings: Vec::new(),
        };

        let response: GenerateContentResponse = self.call(&self.image_model, &body).await?;
        let image = response.into_image()?;

        tracing::debug!(
            model = %self.image_model,
            latency_ms = start.elapsed().as_millis() as u64,
            bytes = image.bytes.len(),
            "Gemini image generated"
        );
        Ok(image)
    }
}

#[async_trait]
impl TextProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate_text(&self, request: &TextRequest) -> Result<String, GenerateError> {
        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    inline_data: None,
                    text: Some(request.prompt.clone()),
                }],
            }],
            generation_config: None,
            safety_settings: HARM_CATEGORIES
                .iter()
                .map(|category| SafetySetting {
                    category: category.to_string(),
                    threshold: "BLOCK_NONE".to_string(),
                })
                .collect(),
        };

        let response: GenerateContentResponse = self.call(&self.text_model, &body).await?;
        response.into_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> GenerateContentResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_image_response_extracts_inline_data() {
        let resp = parse(
            r#"{"candidates":[{"content":{"parts":[
                {"text":"here you go"},
                {"inlineData":{"mimeType":"image/png","data":"AQID"}}
            ]},"finishReason":"STOP"}]}"#,
        );
        let image = resp.into_image().unwrap();
        assert_eq!(image.bytes, vec![1, 2, 3]);
        assert_eq!(image.mime_type, "image/png");
    }

    #[test]
    fn test_block_reason_is_content_blocked() {
        let resp = parse(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#);
        assert_eq!(
            resp.into_image().unwrap_err(),
            GenerateError::ContentBlocked {
                reason: "SAFETY".to_string()
            }
        );
    }

    #[test]
    fn test_no_image_finish_reason_is_no_result() {
        let resp = parse(r#"{"candidates":[{"finishReason":"NO_IMAGE"}]}"#);
        assert!(matches!(
            resp.into_image().unwrap_err(),
            GenerateError::NoResult { .. }
        ));
    }

    #[test]
    fn test_missing_inline_data_is_no_result() {
        let resp = parse(r#"{"candidates":[{"content":{"parts":[{"text":"sorry"}]}}]}"#);
        let err = resp.into_image().unwrap_err();
        assert!(err.to_string().contains("no inline image data"));
    }

    #[test]
    fn test_empty_response_is_no_result() {
        let resp = parse("{}");
        assert!(matches!(
            resp.into_image().unwrap_err(),
            GenerateError::NoResult { .. }
        ));
    }

    #[test]
    fn test_text_response_joins_parts() {
        let resp = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":" Retro "},{"text":"Film\n"}]}}]}"#,
        );
        assert_eq!(resp.into_text().unwrap(), "Retro Film");
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    inline_data: Some(InlineData {
                        mime_type: "image/jpeg".to_string(),
                        data: "AQID".to_string(),
                    }),
                    text: None,
                }],
            }],
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["IMAGE".to_string()],
            }),
            safety_settings: Vec::new(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json["contents"][0]["parts"][0]["inlineData"]["mimeType"],
            "image/jpeg"
        );
        assert_eq!(json["generationConfig"]["responseModalities"][0], "IMAGE");
        assert!(json.get("safetySettings").is_none());
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_network() {
        // Unroutable endpoint: a network attempt would surface as Transient.
        let provider = GeminiProvider::new("http://127.0.0.1:9", None, "img", "txt");
        let err = provider
            .generate_image(&ImageRequest::new("prompt", None))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerateError::CredentialMissing { .. }));
    }
}
