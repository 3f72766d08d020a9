//! Error types for the DocChat domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

use crate::file::format_file_size;

/// The top-level error type for all DocChat operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Connectivity ---
    /// The remote client could not be constructed.
    #[error("Connection error: {0}")]
    Connection(#[source] ProviderError),

    /// A mutating operation was attempted on a disconnected session.
    #[error("Session is disconnected: {reason}")]
    Disconnected { reason: String },

    // --- File registry errors ---
    #[error("File error: {0}")]
    File(#[from] FileError),

    // --- Generation ---
    /// A failed model call. Logged and turned into an assistant message,
    /// never returned from a session.
    #[error("Generation error: {0}")]
    Generation(#[source] ProviderError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures reported by a remote service (storage or generation).
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures of the file registry.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("File '{0}' has already been uploaded")]
    DuplicateName(String),

    #[error(
        "File '{name}' is too large ({}, max {})",
        format_file_size(*size_bytes),
        format_file_size(*limit_bytes)
    )]
    FileTooLarge {
        name: String,
        size_bytes: u64,
        limit_bytes: u64,
    },

    #[error("Upload of '{name}' failed: {source}")]
    RemoteUpload {
        name: String,
        #[source]
        source: ProviderError,
    },

    #[error("File '{0}' not found")]
    NotFound(String),
}
