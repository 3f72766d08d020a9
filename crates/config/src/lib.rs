//! Configuration loading, validation, and management for DocChat.
//!
//! Loads configuration from `~/.docchat/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.docchat/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Gemini API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the Gemini REST API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model used for generation
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens per model response
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// HTTP client timeout for remote calls (unset = wait indefinitely)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    /// Upload limits
    #[serde(default)]
    pub uploads: UploadConfig,

    /// Instruction profile sent with every generation request
    #[serde(default)]
    pub instructions: InstructionProfile,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_api_url() -> String {
    "https://generativelanguage.googleapis.com".into()
}
fn default_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_output_tokens() -> u32 {
    2048
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field(
                "api_key",
                &match self.api_key {
                    Some(_) => "[REDACTED]",
                    None => "None",
                },
            )
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("uploads", &self.uploads)
            .field("instructions", &self.instructions)
            .field("gateway", &self.gateway)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Per-file size limit in bytes (at most 2 GiB)
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    /// How long the remote store keeps files; shown to users, not enforced
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u32,
}

fn default_max_file_bytes() -> u64 {
    docchat_core::file::MAX_FILE_BYTES
}
fn default_retention_hours() -> u32 {
    48
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: default_max_file_bytes(),
            retention_hours: default_retention_hours(),
        }
    }
}

/// Persona, answer language, and formatting rules for the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionProfile {
    #[serde(default = "default_persona")]
    pub persona: String,

    #[serde(default = "default_response_language")]
    pub response_language: String,

    #[serde(default = "default_directives")]
    pub directives: Vec<String>,
}

fn default_persona() -> String {
    "You are an intelligent AI assistant that analyses and discusses the content \
     of documents uploaded by the user (PDF, CSV and TXT files)."
        .into()
}
fn default_response_language() -> String {
    "Vietnamese".into()
}
fn default_directives() -> Vec<String> {
    [
        "Base your answers on the content of the provided files.",
        "If the information is not in the files, say so clearly.",
        "Structure answers so they are easy to read, using bullet points or numbered lists where helpful.",
        "Quote specific information from the files when possible.",
        "For PDF files, read the full text, tables and structure.",
        "For CSV files, analyse the data: statistics, trends and relationships between columns.",
        "For TXT files, summarise and extract the main ideas.",
        "Be friendly, helpful and professional.",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl InstructionProfile {
    /// Render the profile as a single system instruction.
    pub fn render(&self) -> String {
        let mut out = self.persona.trim().to_string();
        if !self.response_language.trim().is_empty() {
            out.push_str(&format!(
                "\n\nAlways respond in {}.",
                self.response_language.trim()
            ));
        }
        if !self.directives.is_empty() {
            out.push_str("\n\nGuidelines:");
            for (i, d) in self.directives.iter().enumerate() {
                out.push_str(&format!("\n{}. {}", i + 1, d));
            }
        }
        out
    }
}

impl Default for InstructionProfile {
    fn default() -> Self {
        Self {
            persona: default_persona(),
            response_language: default_response_language(),
            directives: default_directives(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Live browser sessions kept before the oldest is evicted
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_port() -> u16 {
    8501
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_max_sessions() -> usize {
    1_000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            max_sessions: default_max_sessions(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.docchat/config.toml).
    ///
    /// Also checks environment variables:
    /// - `DOCCHAT_API_KEY`, `GEMINI_API_KEY`, `GOOGLE_API_KEY` (in that order)
    /// - `DOCCHAT_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using the given lookup.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = ["DOCCHAT_API_KEY", "GEMINI_API_KEY", "GOOGLE_API_KEY"]
                .into_iter()
                .find_map(|key| var(key).filter(|v| !v.trim().is_empty()));
        }

        if let Some(model) = var("DOCCHAT_MODEL").filter(|m| !m.trim().is_empty()) {
            self.model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".docchat")
    }

    /// Path of the config file inside [`AppConfig::config_dir`].
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.max_output_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "max_output_tokens must be > 0".into(),
            ));
        }

        if self.uploads.max_file_bytes > docchat_core::file::MAX_FILE_BYTES {
            return Err(ConfigError::ValidationError(
                "uploads.max_file_bytes must not exceed 2 GiB".into(),
            ));
        }

        if self.request_timeout_secs == Some(0) {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be > 0 when set".into(),
            ));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationError("model must not be empty".into()));
        }

        if self.gateway.max_sessions == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.max_sessions must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            request_timeout_secs: None,
            uploads: UploadConfig::default(),
            instructions: InstructionProfile::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
