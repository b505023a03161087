//! One-to-two sentence summaries.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::enrich::parse::truncate_chars;
use crate::enrich::rate_limit::RateLimiter;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

/// Returned whenever a summary cannot be generated.
pub const SUMMARY_UNAVAILABLE: &str = "Summary unavailable";

/// Characters of body sent for summarization.
pub const SUMMARY_INPUT_CHARS: usize = 2500;

const SUMMARY_MAX_TOKENS: u32 = 150;

const SUMMARY_INSTRUCTION: &str = "Summarize this email in 1-2 sentences. Keep only key \
    information. If it contains a verification code or one-time passcode (OTP), say so explicitly.";

pub struct Summarizer {
    llm: Arc<dyn LlmProvider>,
    limiter: Arc<RateLimiter>,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn LlmProvider>, limiter: Arc<RateLimiter>) -> Self {
        Self { llm, limiter }
    }

    /// Summarize `body`. Never fails: errors and empty output yield
    /// [`SUMMARY_UNAVAILABLE`].
    pub async fn summarize(&self, body: &str) -> String {
        if !self.llm.is_configured() {
            return SUMMARY_UNAVAILABLE.to_string();
        }

        let excerpt = truncate_chars(body, SUMMARY_INPUT_CHARS);
        let request = CompletionRequest::new(vec![ChatMessage::user(format!(
            "{SUMMARY_INSTRUCTION}\n\n{excerpt}"
        ))])
        .with_max_tokens(SUMMARY_MAX_TOKENS);

        self.limiter.wait().await;
        match self.llm.complete(request).await {
            Ok(response) => {
                let summary = response.content.trim();
                if summary.is_empty() {
                    warn!("Model returned an empty summary");
                    SUMMARY_UNAVAILABLE.to_string()
                } else {
                    debug!(chars = summary.len(), "Summary generated");
                    summary.to_string()
                }
            }
            Err(e) => {
                warn!(error = %e, "Summary generation failed");
                SUMMARY_UNAVAILABLE.to_string()
            }
        }
    }
}
