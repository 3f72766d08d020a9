//! Remote service traits: the abstraction over the hosted file store and
//! the hosted generation model.
//!
//! A `FileStore` accepts raw document bytes and hands back an opaque
//! `RemoteHandle`. A `GenerationService` turns a prompt plus handles into
//! text. The Gemini implementation lives in `docchat-providers`; tests use
//! in-process fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Opaque reference to a file held by the storage service.
///
/// Reusable across generation requests until the service expires it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteHandle {
    /// Resource name assigned by the service (e.g. `files/abc123`)
    pub name: String,

    /// URI used to reference the file in generation requests
    pub uri: String,

    /// MIME type the service recorded for the file
    pub mime_type: String,

    /// When the service will drop the file, if it told us
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Metadata sent alongside the raw bytes of an upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadMetadata {
    pub mime_type: String,
    pub display_name: String,
}

/// One element of a generation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    File { handle: RemoteHandle },
}

/// A single generation round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model identifier (e.g. "gemini-2.0-flash")
    pub model: String,

    /// Ordered payload: prompt text first, then file handles
    pub parts: Vec<ContentPart>,

    /// Instruction profile rendered as a system instruction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,

    pub temperature: f32,

    pub max_output_tokens: u32,
}

impl GenerationRequest {
    /// The prompt text of the request (first text part), if any.
    pub fn prompt(&self) -> Option<&str> {
        self.parts.iter().find_map(|p| match p {
            ContentPart::Text { text } => Some(text.as_str()),
            ContentPart::File { .. } => None,
        })
    }

    /// Handles attached to the request, in payload order.
    pub fn file_handles(&self) -> impl Iterator<Item = &RemoteHandle> {
        self.parts.iter().filter_map(|p| match p {
            ContentPart::File { handle } => Some(handle),
            ContentPart::Text { .. } => None,
        })
    }
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The text produced by a generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub text: String,

    /// Which model actually responded (may differ from requested)
    pub model: String,

    pub usage: Option<Usage>,
}

/// Hosted file storage.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// A human-readable name for this store (e.g., "gemini").
    fn name(&self) -> &str;

    /// Upload raw bytes and return the handle the service assigned.
    async fn upload(
        &self,
        bytes: Vec<u8>,
        metadata: UploadMetadata,
    ) -> std::result::Result<RemoteHandle, ProviderError>;
}

/// Hosted text generation.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// A human-readable name for this service (e.g., "gemini").
    fn name(&self) -> &str;

    /// Send a request and wait for the complete response.
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<GenerationResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(name: &str) -> RemoteHandle {
        RemoteHandle {
            name: format!("files/{name}"),
            uri: format!("https://example.test/files/{name}"),
            mime_type: "text/csv".into(),
            expires_at: None,
        }
    }

    #[test]
    fn request_accessors_follow_payload_order() {
        let req = GenerationRequest {
            model: "gemini-2.0-flash".into(),
            parts: vec![
                ContentPart::Text {
                    text: "Summarize".into(),
                },
                ContentPart::File { handle: handle("a") },
                ContentPart::File { handle: handle("b") },
            ],
            system_instruction: None,
            temperature: 0.3,
            max_output_tokens: 2048,
        };
        assert_eq!(req.prompt(), Some("Summarize"));
        let names: Vec<_> = req.file_handles().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["files/a", "files/b"]);
    }

    #[test]
    fn content_part_serialization_is_tagged() {
        let json = serde_json::to_value(ContentPart::Text { text: "hi".into() }).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["text"], "hi");
    }
}
