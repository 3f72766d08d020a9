//! Remote service implementations for DocChat.
//!
//! The Gemini provider implements both `docchat_core::FileStore` and
//! `docchat_core::GenerationService`. [`build_from_config`] is the single
//! place a client is constructed; its failure is what leaves a session
//! disconnected.

pub mod gemini;

use std::time::Duration;

use docchat_core::error::ProviderError;

pub use gemini::GeminiProvider;

/// Build the Gemini client described by the configuration.
pub fn build_from_config(
    config: &docchat_config::AppConfig,
) -> Result<GeminiProvider, ProviderError> {
    let api_key = config.api_key.clone().unwrap_or_default();

    let provider = match config.request_timeout_secs {
        Some(secs) => GeminiProvider::with_timeout(api_key, Duration::from_secs(secs))?,
        None => GeminiProvider::new(api_key)?,
    };

    Ok(provider.with_base_url(&config.api_url))
}
