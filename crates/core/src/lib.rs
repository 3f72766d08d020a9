//! # DocChat Core
//!
//! Domain types, traits, and error definitions for DocChat, a chat front-end
//! that lets a user upload documents to a hosted model's file store and ask
//! questions about a chosen subset of them.
//!
//! ## Layout
//!
//! - [`file`]: the per-session file registry
//! - [`selection`]: which registered files are attached to the next prompt
//! - [`message`]: the conversation log and transcript export
//! - [`provider`]: traits over the remote file store and generation model
//!
//! Remote services are traits here; the Gemini implementation lives in
//! `docchat-providers`.

pub mod error;
pub mod file;
pub mod message;
pub mod provider;
pub mod selection;

// Re-export key types at crate root for ergonomics
pub use error::{Error, FileError, ProviderError, Result};
pub use file::{FileRegistry, UploadedFile, file_icon, format_file_size, mime_type_for};
pub use message::{ConversationLog, Message, Role, transcript_filename};
pub use provider::{
    ContentPart, FileStore, GenerationRequest, GenerationResponse, GenerationService,
    RemoteHandle, UploadMetadata, Usage,
};
pub use selection::{ContextSelection, ContextSelector};
