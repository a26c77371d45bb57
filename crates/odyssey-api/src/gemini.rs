//! Google Gemini `Generator` over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use odyssey_core::asset::Asset;
use odyssey_core::error::GenerationError;
use odyssey_core::generator::Generator;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, instrument};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const TEXT_MODEL: &str = "gemini-2.5-flash";
const IMAGE_MODEL: &str = "gemini-2.5-flash-image";
const TIMEOUT: Duration = Duration::from_secs(30);

/// Gemini API client.
#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

impl GeminiRequest {
    fn user(prompt: &str) -> Self {
        Self {
            system_instruction: None,
            contents: vec![GeminiContent {
                role: Some("user"),
                parts: vec![TextPart {
                    text: prompt.to_owned(),
                }],
            }],
            generation_config: None,
        }
    }
}

impl GeminiGenerator {
    /// Creates a client for the public endpoint.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::Backend` if the key is empty or the HTTP
    /// client cannot be built.
    pub fn new(api_key: impl Into<String>) -> Result<Self, GenerationError> {
        Self::with_base_url(api_key, BASE_URL)
    }

    /// Creates a client for a custom endpoint.
    ///
    /// # Errors
    ///
    /// Returns `GenerationError::Backend` if the key is empty or the HTTP
    /// client cannot be built.
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, GenerationError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(GenerationError::Backend("missing Gemini API key".into()));
        }
        let client = Client::builder()
            .timeout(TIMEOUT)
            .build()
            .map_err(|e| GenerationError::Backend(e.to_string()))?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.into(),
        })
    }

    async fn call(&self, model: &str, body: &GeminiRequest) -> Result<Vec<ResponsePart>, GenerationError> {
        let url = format!("{}/{model}:generateContent", self.base_url);
        debug!(model, "sending Gemini request");

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        let text = response.text().await.map_err(request_error)?;
        if !status.is_success() {
            error!(%status, model, "Gemini API error");
            return Err(status_error(status, &text));
        }
        response_parts(&text)
    }
}

fn request_error(err: reqwest::Error) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout(TIMEOUT.as_secs())
    } else {
        GenerationError::Backend(err.to_string())
    }
}

fn status_error(status: StatusCode, body: &str) -> GenerationError {
    let detail = format!("HTTP {status}: {}", body.chars().take(200).collect::<String>());
    if status == StatusCode::TOO_MANY_REQUESTS {
        GenerationError::Quota(detail)
    } else {
        GenerationError::Backend(detail)
    }
}

fn response_parts(body: &str) -> Result<Vec<ResponsePart>, GenerationError> {
    let response: GeminiResponse =
        serde_json::from_str(body).map_err(|e| GenerationError::Malformed(e.to_string()))?;
    let parts = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts)
        .unwrap_or_default();
    if parts.is_empty() {
        return Err(GenerationError::Malformed("no content parts in response".into()));
    }
    Ok(parts)
}

fn first_text(parts: Vec<ResponsePart>) -> Result<String, GenerationError> {
    parts
        .into_iter()
        .find_map(|p| p.text)
        .map(|t| t.trim().to_owned())
        .ok_or_else(|| GenerationError::Malformed("no text part in response".into()))
}

fn first_image(parts: Vec<ResponsePart>) -> Result<Asset, GenerationError> {
    let inline = parts
        .into_iter()
        .find_map(|p| p.inline_data)
        .ok_or_else(|| GenerationError::Malformed("no image data in response".into()))?;
    let data = STANDARD
        .decode(inline.data.as_bytes())
        .map_err(|e| GenerationError::Malformed(format!("invalid base64 image data: {e}")))?;
    Ok(Asset::new(inline.mime_type, data))
}

#[async_trait]
impl Generator for GeminiGenerator {
    #[instrument(skip_all)]
    async fn generate_image(&self, prompt: &str) -> Result<Asset, GenerationError> {
        let mut body = GeminiRequest::user(prompt);
        body.generation_config = Some(GenerationConfig {
            response_modalities: Some(vec!["TEXT", "IMAGE"]),
            ..GenerationConfig::default()
        });
        first_image(self.call(IMAGE_MODEL, &body).await?)
    }

    #[instrument(skip_all)]
    async fn generate_text(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<String, GenerationError> {
        let mut body = GeminiRequest::user(prompt);
        body.system_instruction = system_prompt.map(|system| GeminiContent {
            role: None,
            parts: vec![TextPart {
                text: system.to_owned(),
            }],
        });
        first_text(self.call(TEXT_MODEL, &body).await?)
    }

    /// Returns the parsed JSON when the reply is bare JSON, otherwise the raw
    /// text as a JSON string for the caller to clean up.
    #[instrument(skip_all)]
    async fn generate_structured(&self, prompt: &str) -> Result<Value, GenerationError> {
        let mut body = GeminiRequest::user(prompt);
        body.generation_config = Some(GenerationConfig {
            response_mime_type: Some("application/json"),
            ..GenerationConfig::default()
        });
        let text = first_text(self.call(TEXT_MODEL, &body).await?)?;
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_text_is_taken_from_first_text_part() {
        let body = json!({
            "candidates": [{ "content": { "parts": [
                { "inlineData": { "mimeType": "image/png", "data": "AAAA" } },
                { "text": "  The engines roar.  " }
            ]}}]
        })
        .to_string();

        let text = first_text(response_parts(&body).unwrap()).unwrap();

        assert_eq!(text, "The engines roar.");
    }

    #[test]
    fn test_inline_image_is_decoded() {
        let body = json!({
            "candidates": [{ "content": { "parts": [
                { "text": "here you go" },
                { "inlineData": { "mimeType": "image/png", "data": STANDARD.encode(b"png-bytes") } }
            ]}}]
        })
        .to_string();

        let asset = first_image(response_parts(&body).unwrap()).unwrap();

        assert_eq!(asset.mime_type, "image/png");
        assert_eq!(asset.data, b"png-bytes");
    }

    #[test]
    fn test_missing_candidates_is_malformed() {
        let result = response_parts(r#"{"candidates": []}"#);

        assert!(matches!(result, Err(GenerationError::Malformed(_))));
    }

    #[test]
    fn test_image_reply_without_image_is_malformed() {
        let body = json!({
            "candidates": [{ "content": { "parts": [{ "text": "sorry" }] } }]
        })
        .to_string();

        let result = first_image(response_parts(&body).unwrap());

        assert!(matches!(result, Err(GenerationError::Malformed(_))));
    }

    #[test]
    fn test_rate_limit_status_is_quota_error() {
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            GenerationError::Quota(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, "oops"),
            GenerationError::Backend(_)
        ));
    }

    #[test]
    fn test_request_serializes_in_gemini_shape() {
        let mut body = GeminiRequest::user("describe the bridge");
        body.generation_config = Some(GenerationConfig {
            response_mime_type: Some("application/json"),
            ..GenerationConfig::default()
        });

        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(
            value,
            json!({
                "contents": [{ "role": "user", "parts": [{ "text": "describe the bridge" }] }],
                "generationConfig": { "responseMimeType": "application/json" }
            })
        );
    }

    #[test]
    fn test_empty_key_is_rejected() {
        assert!(GeminiGenerator::new(" ").is_err());
    }
}
