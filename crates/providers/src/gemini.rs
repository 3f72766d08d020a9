//! Google Gemini provider implementation.
//!
//! Talks to the Gemini REST API directly:
//!
//! - Files API, resumable protocol (`start` then `upload, finalize`)
//! - `models/{model}:generateContent` with `file_data` parts
//! - `x-goog-api-key` header authentication
//!
//! One client serves both the `FileStore` and `GenerationService` roles.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docchat_core::error::ProviderError;
use docchat_core::provider::*;
use serde::Deserialize;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const API_VERSION: &str = "v1beta";

/// Gemini Files + generateContent provider.
pub struct GeminiProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl GeminiProvider {
    /// Create a new Gemini provider with no request timeout.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::build(api_key.into(), None)
    }

    /// Create a provider whose HTTP calls give up after `timeout`.
    pub fn with_timeout(
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        Self::build(api_key.into(), Some(timeout))
    }

    fn build(api_key: String, timeout: Option<Duration>) -> Result<Self, ProviderError> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::NotConfigured(
                "no Gemini API key configured".into(),
            ));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ProviderError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            name: "gemini".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key,
            client,
        })
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Map a non-success HTTP status to a `ProviderError`.
    async fn check_status(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ProviderError> {
        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited);
        }
        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid Gemini API key".into(),
            ));
        }
        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Gemini API error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        Ok(response)
    }

    /// Build the JSON body of a `generateContent` call.
    pub(crate) fn build_generate_body(request: &GenerationRequest) -> serde_json::Value {
        let parts: Vec<serde_json::Value> = request
            .parts
            .iter()
            .map(|part| match part {
                ContentPart::Text { text } => serde_json::json!({ "text": text }),
                ContentPart::File { handle } => serde_json::json!({
                    "file_data": {
                        "mime_type": handle.mime_type,
                        "file_uri": handle.uri,
                    }
                }),
            })
            .collect();

        let mut body = serde_json::json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "temperature": request.temperature,
                "maxOutputTokens": request.max_output_tokens,
            },
        });

        if let Some(ref instruction) = request.system_instruction {
            body["system_instruction"] = serde_json::json!({
                "parts": [{ "text": instruction }]
            });
        }

        body
    }

    /// Turn a parsed `generateContent` response into text.
    pub(crate) fn parse_generate_response(
        api: ApiGenerateResponse,
        requested_model: &str,
    ) -> Result<GenerationResponse, ProviderError> {
        let candidate = api.candidates.into_iter().next();

        let text: String = candidate
            .as_ref()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            if let Some(reason) = api.prompt_feedback.and_then(|f| f.block_reason) {
                return Err(ProviderError::InvalidResponse(format!(
                    "prompt was blocked ({reason})"
                )));
            }
            let finish = candidate
                .and_then(|c| c.finish_reason)
                .unwrap_or_else(|| "unknown".into());
            return Err(ProviderError::InvalidResponse(format!(
                "response contained no text (finish reason: {finish})"
            )));
        }

        Ok(GenerationResponse {
            text,
            model: api
                .model_version
                .unwrap_or_else(|| requested_model.to_string()),
            usage: api.usage_metadata.map(|u| Usage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            }),
        })
    }

    /// Turn the `file` object of an upload response into a handle.
    pub(crate) fn parse_uploaded_file(
        file: ApiFile,
        fallback_mime: &str,
    ) -> Result<RemoteHandle, ProviderError> {
        if file.uri.is_empty() {
            return Err(ProviderError::InvalidResponse(format!(
                "uploaded file '{}' has no URI",
                file.name
            )));
        }

        Ok(RemoteHandle {
            name: file.name,
            uri: file.uri,
            mime_type: file.mime_type.unwrap_or_else(|| fallback_mime.to_string()),
            expires_at: file.expiration_time,
        })
    }
}

#[async_trait]
impl FileStore for GeminiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upload(
        &self,
        bytes: Vec<u8>,
        metadata: UploadMetadata,
    ) -> Result<RemoteHandle, ProviderError> {
        let start_url = format!("{}/upload/{API_VERSION}/files", self.base_url);
        let body = serde_json::json!({
            "file": { "display_name": metadata.display_name }
        });

        debug!(
            provider = "gemini",
            file = %metadata.display_name,
            bytes = bytes.len(),
            "Starting resumable upload"
        );

        let response = self
            .client
            .post(&start_url)
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", &metadata.mime_type)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        let response = Self::check_status(response).await?;

        let upload_url = response
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                ProviderError::InvalidResponse("upload session returned no upload URL".into())
            })?;

        let response = self
            .client
            .post(&upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        let response = Self::check_status(response).await?;

        let api: ApiUploadResponse = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse Gemini upload response: {e}"))
        })?;

        debug!(
            provider = "gemini",
            remote = %api.file.name,
            state = api.file.state.as_deref().unwrap_or("unknown"),
            "Upload finalized"
        );

        Self::parse_uploaded_file(api.file, &metadata.mime_type)
    }
}

#[async_trait]
impl GenerationService for GeminiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, ProviderError> {
        let url = format!(
            "{}/{API_VERSION}/models/{}:generateContent",
            self.base_url, request.model
        );
        let body = Self::build_generate_body(&request);

        debug!(
            provider = "gemini",
            model = %request.model,
            files = request.file_handles().count(),
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        let response = Self::check_status(response).await?;

        let api: ApiGenerateResponse = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse Gemini response: {e}"))
        })?;

        let parsed = Self::parse_generate_response(api, &request.model)?;
        if let Some(ref usage) = parsed.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Gemini usage"
            );
        }
        Ok(parsed)
    }
}

// --- Gemini API types ---

#[derive(Debug, Deserialize)]
pub(crate) struct ApiUploadResponse {
    file: ApiFile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApiFile {
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    expiration_time: Option<DateTime<Utc>>,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApiGenerateResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<ApiPromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<ApiUsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiContent {
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Debug, Deserialize)]
struct ApiPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_handle() -> RemoteHandle {
        RemoteHandle {
            name: "files/abc".into(),
            uri: "https://generativelanguage.googleapis.com/v1beta/files/abc".into(),
            mime_type: "text/csv".into(),
            expires_at: None,
        }
    }

    fn request(system: Option<&str>) -> GenerationRequest {
        GenerationRequest {
            model: "gemini-2.0-flash".into(),
            parts: vec![
                ContentPart::Text {
                    text: "What is X?".into(),
                },
                ContentPart::File {
                    handle: csv_handle(),
                },
            ],
            system_instruction: system.map(str::to_string),
            temperature: 0.3,
            max_output_tokens: 2048,
        }
    }

    #[test]
    fn empty_api_key_is_not_configured() {
        let err = GeminiProvider::new("  ").unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let p = GeminiProvider::new("key")
            .unwrap()
            .with_base_url("http://localhost:9000/");
        assert_eq!(p.base_url(), "http://localhost:9000");
    }

    #[test]
    fn debug_hides_api_key() {
        let p = GeminiProvider::new("super-secret").unwrap();
        assert!(!format!("{p:?}").contains("super-secret"));
    }

    #[test]
    fn generate_body_puts_prompt_before_files() {
        let body = GeminiProvider::build_generate_body(&request(None));
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["text"], "What is X?");
        assert_eq!(parts[1]["file_data"]["mime_type"], "text/csv");
        assert_eq!(
            parts[1]["file_data"]["file_uri"],
            "https://generativelanguage.googleapis.com/v1beta/files/abc"
        );
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 2048);
        assert!(body.get("system_instruction").is_none());
    }

    #[test]
    fn generate_body_carries_system_instruction() {
        let body = GeminiProvider::build_generate_body(&request(Some("Answer in Vietnamese.")));
        assert_eq!(
            body["system_instruction"]["parts"][0]["text"],
            "Answer in Vietnamese."
        );
        let temp = body["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temp - 0.3).abs() < 1e-6);
    }

    #[test]
    fn response_text_parts_are_concatenated() {
        let api: ApiGenerateResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Hello, " }, { "text": "world" }] },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 12, "candidatesTokenCount": 3, "totalTokenCount": 15 },
            "modelVersion": "gemini-2.0-flash-001"
        }))
        .unwrap();

        let resp = GeminiProvider::parse_generate_response(api, "gemini-2.0-flash").unwrap();
        assert_eq!(resp.text, "Hello, world");
        assert_eq!(resp.model, "gemini-2.0-flash-001");
        assert_eq!(resp.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let api: ApiGenerateResponse = serde_json::from_value(serde_json::json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        }))
        .unwrap();

        let err = GeminiProvider::parse_generate_response(api, "gemini-2.0-flash").unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn empty_candidate_reports_finish_reason() {
        let api: ApiGenerateResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{ "finishReason": "MAX_TOKENS" }]
        }))
        .unwrap();

        let err = GeminiProvider::parse_generate_response(api, "gemini-2.0-flash").unwrap_err();
        assert!(err.to_string().contains("MAX_TOKENS"));
    }

    #[test]
    fn uploaded_file_becomes_handle() {
        let api: ApiUploadResponse = serde_json::from_value(serde_json::json!({
            "file": {
                "name": "files/xyz",
                "displayName": "report.pdf",
                "mimeType": "application/pdf",
                "sizeBytes": "1024",
                "uri": "https://generativelanguage.googleapis.com/v1beta/files/xyz",
                "state": "ACTIVE",
                "expirationTime": "2025-01-03T10:00:00.123456Z"
            }
        }))
        .unwrap();

        let handle = GeminiProvider::parse_uploaded_file(api.file, "text/plain").unwrap();
        assert_eq!(handle.name, "files/xyz");
        assert_eq!(handle.mime_type, "application/pdf");
        assert!(handle.expires_at.is_some());
    }

    #[test]
    fn uploaded_file_without_uri_is_rejected() {
        let api: ApiUploadResponse =
            serde_json::from_value(serde_json::json!({ "file": { "name": "files/xyz" } }))
                .unwrap();
        assert!(GeminiProvider::parse_uploaded_file(api.file, "text/plain").is_err());
    }
}
