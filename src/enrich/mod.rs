//! AI enrichment: rate-limited summaries, tags and reply suggestions.

pub mod orchestrator;
pub mod parse;
pub mod rate_limit;
pub mod replies;
pub mod summarizer;
pub mod tagger;
pub mod types;

pub use orchestrator::{DEGRADED_SUMMARY, Enricher, Stage};
pub use rate_limit::RateLimiter;
pub use replies::SmartReplier;
pub use summarizer::{SUMMARY_UNAVAILABLE, Summarizer};
pub use tagger::{TagCandidate, Tagger};
pub use types::{EnrichedEmail, Tag};
