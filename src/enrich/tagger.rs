//! Topical tagging with a layered fallback chain.
//!
//! Order of preference for a model response:
//! 1. a JSON array of `{name, confidence}` objects or bare names
//! 2. known vocabulary words found anywhere in the response text
//! 3. keywords in the subject line
//! 4. `general`
//!
//! When the service is unreachable only the subject fallback applies.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::enrich::parse::{extract_json_array, truncate_chars};
use crate::enrich::rate_limit::RateLimiter;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

/// The closed tag vocabulary offered to the model, in scan order.
pub const VOCABULARY: [(&str, &str); 8] = [
    ("academic", "coursework, assignments, lectures, projects"),
    ("sports", "sports activities, games, tournaments"),
    ("event", "campus events, seminars, meetings"),
    ("club", "student clubs and organizations"),
    ("admin", "administrative announcements"),
    ("deadline", "submissions or applications with a deadline"),
    ("urgent", "time-sensitive matters"),
    ("low", "low-priority informational email"),
];

pub const FALLBACK_TAG: &str = "general";
pub const MAX_TAGS: usize = 3;
pub const TAG_INPUT_CHARS: usize = 1500;

const TAG_MAX_TOKENS: u32 = 150;
const DEADLINE_KEYWORDS: [&str; 3] = ["deadline", "due", "submit"];
const URGENT_KEYWORDS: [&str; 3] = ["urgent", "important", "asap"];

/// A tag as proposed by the model: either a bare name or a name with a
/// confidence score.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TagCandidate {
    Scored {
        name: String,
        #[serde(default = "full_confidence")]
        confidence: f64,
    },
    Bare(String),
}

fn full_confidence() -> f64 {
    1.0
}

impl TagCandidate {
    pub fn bare(name: impl Into<String>) -> Self {
        Self::Bare(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Scored { name, .. } | Self::Bare(name) => name,
        }
    }

    /// Bare names count as fully confident.
    pub fn confidence(&self) -> f64 {
        match self {
            Self::Scored { confidence, .. } => *confidence,
            Self::Bare(_) => 1.0,
        }
    }

    fn normalized(self) -> Option<Self> {
        let name = self.name().trim().to_lowercase();
        if name.is_empty() {
            return None;
        }
        Some(match self {
            Self::Scored { confidence, .. } => Self::Scored {
                name,
                confidence: if confidence.is_finite() {
                    confidence.clamp(0.0, 1.0)
                } else {
                    1.0
                },
            },
            Self::Bare(_) => Self::Bare(name),
        })
    }
}

pub struct Tagger {
    llm: Arc<dyn LlmProvider>,
    limiter: Arc<RateLimiter>,
}

impl Tagger {
    pub fn new(llm: Arc<dyn LlmProvider>, limiter: Arc<RateLimiter>) -> Self {
        Self { llm, limiter }
    }

    /// Tag a message. Always returns between one and [`MAX_TAGS`] candidates.
    pub async fn tag(&self, body: &str, subject: &str) -> Vec<TagCandidate> {
        if !self.llm.is_configured() {
            return vec![TagCandidate::bare(subject_fallback(subject))];
        }

        let request = CompletionRequest::new(vec![ChatMessage::user(build_prompt(body, subject))])
            .with_max_tokens(TAG_MAX_TOKENS);

        self.limiter.wait().await;
        match self.llm.complete(request).await {
            Ok(response) => interpret_response(&response.content, subject),
            Err(e) => {
                warn!(error = %e, "Tag generation failed");
                vec![TagCandidate::bare(subject_fallback(subject))]
            }
        }
    }
}

fn build_prompt(body: &str, subject: &str) -> String {
    let vocabulary: String = VOCABULARY
        .iter()
        .map(|(name, description)| format!("- {name}: {description}\n"))
        .collect();

    format!(
        "Classify this email using ONLY tags from the list below.\n\n\
         {vocabulary}\n\
         Respond with a JSON array of at most {MAX_TAGS} objects, most relevant first, \
         each with \"name\" and \"confidence\" (0.0-1.0). Output only the JSON array.\n\n\
         Subject: {subject}\n\n\
         Email excerpt:\n{subject}\n\n{excerpt}",
        excerpt = truncate_chars(body, TAG_INPUT_CHARS),
    )
}

/// Turn raw model output into tags, walking the fallback chain.
pub fn interpret_response(response: &str, subject: &str) -> Vec<TagCandidate> {
    if let Some(tags) = parse_structured(response) {
        if !tags.is_empty() {
            return tags;
        }
        debug!("Model returned an empty tag list");
    }

    let scanned = scan_vocabulary(response);
    if !scanned.is_empty() {
        debug!(count = scanned.len(), "Tags recovered from unstructured response");
        return scanned;
    }

    vec![TagCandidate::bare(subject_fallback(subject))]
}

fn parse_structured(response: &str) -> Option<Vec<TagCandidate>> {
    let json = extract_json_array(response)?;
    let candidates: Vec<TagCandidate> = serde_json::from_str(json).ok()?;
    Some(normalize(candidates))
}

/// Lower-case and trim names, drop blanks and repeats, clamp confidence,
/// keep the first [`MAX_TAGS`].
fn normalize(candidates: Vec<TagCandidate>) -> Vec<TagCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter_map(TagCandidate::normalized)
        .filter(|c| seen.insert(c.name().to_string()))
        .take(MAX_TAGS)
        .collect()
}

/// Vocabulary names occurring anywhere in `text`, in vocabulary order.
/// Plain substring match, so plurals such as "events" count.
fn scan_vocabulary(text: &str) -> Vec<TagCandidate> {
    let lowered = text.to_lowercase();
    VOCABULARY
        .iter()
        .map(|(name, _)| *name)
        .filter(|name| lowered.contains(name))
        .take(MAX_TAGS)
        .map(TagCandidate::bare)
        .collect()
}

fn subject_fallback(subject: &str) -> &'static str {
    let subject = subject.to_lowercase();
    if DEADLINE_KEYWORDS.iter().any(|kw| subject.contains(kw)) {
        "deadline"
    } else if URGENT_KEYWORDS.iter().any(|kw| subject.contains(kw)) {
        "urgent"
    } else {
        FALLBACK_TAG
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::error::LlmError;
    use crate::llm::CompletionResponse;

    struct StubProvider(Option<&'static str>);

    #[async_trait]
    impl LlmProvider for StubProvider {
        fn model_name(&self) -> &str {
            "stub"
        }

        async fn complete(&self, _: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            match self.0 {
                Some(text) => Ok(CompletionResponse {
                    content: text.to_string(),
                    ..Default::default()
                }),
                None => Err(LlmError::RequestFailed {
                    provider: "stub".into(),
                    reason: "unreachable".into(),
                }),
            }
        }
    }

    fn tagger(reply: Option<&'static str>) -> Tagger {
        Tagger::new(
            Arc::new(StubProvider(reply)),
            Arc::new(RateLimiter::new(Duration::ZERO)),
        )
    }

    fn names(tags: &[TagCandidate]) -> Vec<&str> {
        tags.iter().map(TagCandidate::name).collect()
    }

    // ── Structured responses ────────────────────────────────────────

    #[tokio::test]
    async fn scored_response_used_directly() {
        let tags = tagger(Some(r#"[{"name":"urgent","confidence":0.9}]"#))
            .tag("Server down", "Outage")
            .await;
        assert_eq!(
            tags,
            vec![TagCandidate::Scored {
                name: "urgent".into(),
                confidence: 0.9
            }]
        );
    }

    #[test]
    fn bare_and_mixed_candidates() {
        let tags = interpret_response(r#"["Club", {"name": "event"}]"#, "");
        assert_eq!(names(&tags), vec!["club", "event"]);
        assert_eq!(tags[0].confidence(), 1.0);
        assert_eq!(tags[1].confidence(), 1.0);
    }

    #[test]
    fn fenced_response_parsed() {
        let tags = interpret_response(
            "Here you go:\n```json\n[{\"name\": \"sports\", \"confidence\": 0.7}]\n```",
            "",
        );
        assert_eq!(names(&tags), vec!["sports"]);
    }

    #[test]
    fn structured_names_normalized_deduped_capped() {
        let tags = interpret_response(
            r#"[{"name":" Academic ","confidence":1.7},{"name":"academic","confidence":0.2},
                {"name":"","confidence":0.5},"deadline","event","club"]"#,
            "",
        );
        assert_eq!(names(&tags), vec!["academic", "deadline", "event"]);
        assert_eq!(tags[0].confidence(), 1.0);
    }

    #[test]
    fn unknown_names_from_model_are_kept() {
        let tags = interpret_response(r#"["research"]"#, "");
        assert_eq!(names(&tags), vec!["research"]);
    }

    #[test]
    fn empty_array_falls_back_to_subject() {
        let tags = interpret_response("[]", "URGENT: room change");
        assert_eq!(names(&tags), vec!["urgent"]);
    }

    // ── Unstructured responses ──────────────────────────────────────

    #[test]
    fn text_scan_in_vocabulary_order() {
        let tags = interpret_response("I'd say Deadline, and also academic.", "");
        assert_eq!(names(&tags), vec!["academic", "deadline"]);
    }

    #[test]
    fn text_scan_matches_inflected_names() {
        let tags = interpret_response(
            "This email is about upcoming events, clubs and deadlines.",
            "Weekly digest",
        );
        assert_eq!(names(&tags), vec!["event", "club", "deadline"]);
    }

    #[test]
    fn text_scan_without_vocabulary_uses_subject() {
        let tags = interpret_response("Nothing relevant here.", "Weekly digest");
        assert_eq!(names(&tags), vec!["general"]);
    }

    #[test]
    fn text_scan_capped() {
        let tags = interpret_response("academic sports event club admin", "");
        assert_eq!(names(&tags), vec!["academic", "sports", "event"]);
    }

    #[test]
    fn malformed_json_scanned_as_text() {
        let tags = interpret_response(r#"[{"name": "event", "confidence": high}]"#, "");
        assert_eq!(names(&tags), vec!["event"]);
    }

    // ── Subject fallback ────────────────────────────────────────────

    #[test]
    fn subject_keywords() {
        assert_eq!(subject_fallback("Assignment due Friday"), "deadline");
        assert_eq!(subject_fallback("Please SUBMIT forms"), "deadline");
        assert_eq!(subject_fallback("Important: read this"), "urgent");
        assert_eq!(subject_fallback("Reply ASAP"), "urgent");
        assert_eq!(subject_fallback("Weekly newsletter"), "general");
    }

    #[test]
    fn deadline_keywords_win_over_urgent() {
        assert_eq!(subject_fallback("Urgent: report due today"), "deadline");
    }

    // ── Service failures ────────────────────────────────────────────

    #[tokio::test]
    async fn unreachable_service_uses_subject_keywords() {
        let tags = tagger(None)
            .tag("Submit your report by Friday 5pm", "Assignment due Friday")
            .await;
        assert_eq!(names(&tags), vec!["deadline"]);
    }

    #[tokio::test]
    async fn unreachable_service_without_keywords_yields_general() {
        let tags = tagger(None).tag("See you there", "Movie night").await;
        assert_eq!(names(&tags), vec!["general"]);
    }

    #[tokio::test]
    async fn unstructured_reply_with_no_tags_uses_subject() {
        let tags = tagger(Some("I am not sure how to classify this."))
            .tag("Submit your report by Friday 5pm", "Assignment due Friday")
            .await;
        assert_eq!(names(&tags), vec!["deadline"]);
    }

    #[tokio::test]
    async fn unconfigured_provider_uses_subject_keywords() {
        let tagger = Tagger::new(
            Arc::new(crate::llm::UnconfiguredProvider::new("none")),
            Arc::new(RateLimiter::new(Duration::ZERO)),
        );
        assert_eq!(names(&tagger.tag("body", "Reply ASAP").await), vec!["urgent"]);
        assert_eq!(names(&tagger.tag("body", "Hello").await), vec!["general"]);
    }

    #[test]
    fn prompt_lists_vocabulary_and_truncates() {
        let body = "ж".repeat(5000);
        let prompt = build_prompt(&body, "Club fair");
        for (name, _) in VOCABULARY {
            assert!(prompt.contains(&format!("- {name}:")));
        }
        assert!(prompt.contains("Subject: Club fair"));
        assert_eq!(prompt.matches('ж').count(), TAG_INPUT_CHARS);
    }
}
