//! Text-generation integration.
//!
//! Talks to Groq's OpenAI-compatible chat-completion API through the
//! [`LlmProvider`] trait, so the summarizer, tagger and reply generator can
//! be tested against mock providers.

pub mod groq;
pub mod provider;

pub use groq::{GroqProvider, UnconfiguredProvider};
pub use provider::*;

use std::sync::Arc;

use crate::config::LlmConfig;
use crate::error::LlmError;

/// Create the provider for `config`. Without an API key this is an
/// [`UnconfiguredProvider`] whose calls always fail.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    match &config.api_key {
        Some(key) => {
            let provider = GroqProvider::new(config, key.clone())?;
            tracing::info!("Using Groq (model: {})", config.model);
            Ok(Arc::new(provider))
        }
        None => {
            tracing::warn!("GROQ_API_KEY not set, AI features will use fallbacks");
            Ok(Arc::new(UnconfiguredProvider::new(&config.model)))
        }
    }
}
