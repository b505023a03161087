//! Short reply suggestions for a message.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::enrich::parse::{extract_json_array, truncate_chars};
use crate::enrich::rate_limit::RateLimiter;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

pub const REPLY_COUNT: usize = 3;
pub const REPLY_INPUT_CHARS: usize = 1000;

const REPLY_MAX_TOKENS: u32 = 200;

const URGENT_REPLIES: [&str; REPLY_COUNT] = [
    "Thank you for the urgent notification. I'll address this right away.",
    "I've received your urgent message and will respond promptly.",
    "Thanks for bringing this to my attention. I'll look into it immediately.",
];

const ACADEMIC_REPLIES: [&str; REPLY_COUNT] = [
    "Thank you for the academic information. I'll review it carefully.",
    "I appreciate the update on the coursework. I'll complete it on time.",
    "Thanks for sharing this academic resource. It will be helpful.",
];

const DEADLINE_REPLIES: [&str; REPLY_COUNT] = [
    "I've noted the deadline and will ensure timely submission.",
    "Thank you for the reminder about the deadline.",
    "I'll make sure to complete this before the deadline.",
];

const EVENT_REPLIES: [&str; REPLY_COUNT] = [
    "Thanks for the invitation. I'm looking forward to attending.",
    "Thank you for sharing the event details. I'll add it to my calendar.",
    "The event sounds interesting. Please count me in.",
];

const DEFAULT_REPLIES: [&str; REPLY_COUNT] = [
    "Thank you for your email. I'll get back to you soon.",
    "I appreciate you reaching out. I'll review this carefully.",
    "Thanks for sharing this information.",
];

/// Used when the service cannot be reached at all.
pub const GENERIC_REPLIES: [&str; REPLY_COUNT] = [
    "Thank you for your email.",
    "I'll get back to you soon.",
    "Thanks for reaching out.",
];

pub struct SmartReplier {
    llm: Arc<dyn LlmProvider>,
    limiter: Arc<RateLimiter>,
}

impl SmartReplier {
    pub fn new(llm: Arc<dyn LlmProvider>, limiter: Arc<RateLimiter>) -> Self {
        Self { llm, limiter }
    }

    /// Suggest [`REPLY_COUNT`] replies to `content`, informed by its tags.
    pub async fn suggest(&self, content: &str, tags: &[String]) -> Vec<String> {
        if !self.llm.is_configured() {
            return owned(&GENERIC_REPLIES);
        }

        let request = CompletionRequest::new(vec![ChatMessage::user(build_prompt(content, tags))])
            .with_max_tokens(REPLY_MAX_TOKENS);

        self.limiter.wait().await;
        let response = match self.llm.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Reply generation failed");
                return owned(&GENERIC_REPLIES);
            }
        };

        let canned = canned_replies(tags);
        let mut replies = parse_replies(&response.content);
        if replies.is_empty() {
            debug!("No usable replies in model output, using canned set");
            return owned(canned);
        }

        // Top up short answers from the canned set.
        for reply in canned {
            if replies.len() >= REPLY_COUNT {
                break;
            }
            if !replies.iter().any(|r| r == *reply) {
                replies.push(reply.to_string());
            }
        }
        replies
    }
}

fn build_prompt(content: &str, tags: &[String]) -> String {
    format!(
        "Write {REPLY_COUNT} brief, natural reply suggestions for this email, \
         each one or two sentences.\n\
         The email is tagged: {tags}\n\n\
         Email: {excerpt}\n\n\
         Return ONLY a JSON array of {REPLY_COUNT} strings.",
        tags = tags.join(", "),
        excerpt = truncate_chars(content, REPLY_INPUT_CHARS),
    )
}

fn parse_replies(response: &str) -> Vec<String> {
    let Some(json) = extract_json_array(response) else {
        return Vec::new();
    };
    let Ok(replies) = serde_json::from_str::<Vec<String>>(json) else {
        return Vec::new();
    };
    replies
        .into_iter()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .take(REPLY_COUNT)
        .collect()
}

/// Canned set for the highest-priority tag present.
fn canned_replies(tags: &[String]) -> &'static [&'static str; REPLY_COUNT] {
    let has = |name: &str| tags.iter().any(|t| t.trim().eq_ignore_ascii_case(name));
    if has("urgent") {
        &URGENT_REPLIES
    } else if has("academic") {
        &ACADEMIC_REPLIES
    } else if has("deadline") {
        &DEADLINE_REPLIES
    } else if has("event") {
        &EVENT_REPLIES
    } else {
        &DEFAULT_REPLIES
    }
}

fn owned(replies: &[&str]) -> Vec<String> {
    replies.iter().map(|r| r.to_string()).collect()
}
