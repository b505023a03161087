//! Enrichment orchestrator.
//!
//! Each message moves through `Fetched → Summarizing → Tagging → Assembled`.
//! A panic in any stage is caught and the message is emitted as `Degraded`
//! with a placeholder summary and no tags, so every input message yields
//! exactly one output record. Messages are enriched one at a time.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tracing::{debug, error, info};

use crate::enrich::summarizer::Summarizer;
use crate::enrich::tagger::Tagger;
use crate::enrich::types::{EnrichedEmail, Tag};
use crate::error::MailError;
use crate::mail::{FetchFilter, MailFetcher, RawMessage};
use crate::tags::TagColors;

/// Summary used for messages whose enrichment failed outright.
pub const DEGRADED_SUMMARY: &str = "Error generating summary";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetched,
    Summarizing,
    Tagging,
    Assembled,
    Degraded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetched => "fetched",
            Stage::Summarizing => "summarizing",
            Stage::Tagging => "tagging",
            Stage::Assembled => "assembled",
            Stage::Degraded => "degraded",
        };
        f.write_str(name)
    }
}

pub struct Enricher {
    fetcher: MailFetcher,
    summarizer: Summarizer,
    tagger: Tagger,
    colors: Arc<dyn TagColors>,
}

impl Enricher {
    pub fn new(
        fetcher: MailFetcher,
        summarizer: Summarizer,
        tagger: Tagger,
        colors: Arc<dyn TagColors>,
    ) -> Self {
        Self {
            fetcher,
            summarizer,
            tagger,
            colors,
        }
    }

    pub fn fetcher(&self) -> &MailFetcher {
        &self.fetcher
    }

    /// Fetch and enrich; mail session failures are returned to the caller.
    pub async fn fetch_and_enrich(
        &self,
        limit: usize,
        filter: &FetchFilter,
    ) -> Result<Vec<EnrichedEmail>, MailError> {
        let messages = self.fetcher.fetch(limit, filter).await?;
        Ok(self.enrich_all(messages).await)
    }

    /// Fetch and enrich; mail session failures yield an empty list.
    pub async fn fetch_and_enrich_or_empty(
        &self,
        limit: usize,
        filter: &FetchFilter,
    ) -> Vec<EnrichedEmail> {
        let messages = self.fetcher.fetch_or_empty(limit, filter).await;
        self.enrich_all(messages).await
    }

    /// Enrich messages sequentially, preserving order.
    pub async fn enrich_all(&self, messages: Vec<RawMessage>) -> Vec<EnrichedEmail> {
        let started = Instant::now();
        let count = messages.len();
        let mut enriched = Vec::with_capacity(count);
        for message in messages {
            enriched.push(self.enrich(message).await);
        }
        if count > 0 {
            info!(
                count,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Enriched messages"
            );
        }
        enriched
    }

    /// Enrich one message. Never fails.
    pub async fn enrich(&self, message: RawMessage) -> EnrichedEmail {
        debug!(id = %message.id, stage = %Stage::Fetched, "Enrichment started");
        match AssertUnwindSafe(self.run_stages(&message))
            .catch_unwind()
            .await
        {
            Ok((summary, tags)) => {
                debug!(id = %message.id, stage = %Stage::Assembled, tags = tags.len(), "Enrichment finished");
                EnrichedEmail::new(message, summary, tags)
            }
            Err(panic) => {
                error!(
                    id = %message.id,
                    stage = %Stage::Degraded,
                    error = panic_message(panic.as_ref()),
                    "Enrichment failed, emitting placeholder"
                );
                EnrichedEmail::new(message, DEGRADED_SUMMARY.to_string(), Vec::new())
            }
        }
    }

    async fn run_stages(&self, message: &RawMessage) -> (String, Vec<Tag>) {
        debug!(id = %message.id, stage = %Stage::Summarizing);
        let summary = self.summarizer.summarize(&message.body).await;

        debug!(id = %message.id, stage = %Stage::Tagging);
        let tags = self
            .tagger
            .tag(&message.body, &message.subject)
            .await
            .into_iter()
            .map(|candidate| Tag {
                color: self.colors.color_of(candidate.name()),
                confidence: candidate.confidence(),
                name: candidate.name().to_string(),
            })
            .collect();

        (summary, tags)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::time::Instant;

    use crate::enrich::rate_limit::RateLimiter;
    use crate::enrich::summarizer::SUMMARY_UNAVAILABLE;
    use crate::error::LlmError;
    use crate::llm::{CompletionRequest, CompletionResponse, LlmProvider};
    use crate::mail::session::{FetchReply, MailConnector, MailSession};
    use crate::mail::types::SearchQuery;

    // ── Test doubles ────────────────────────────────────────────────

    /// Answers summary prompts and tag prompts differently.
    enum Script {
        Answer {
            summary: &'static str,
            tags: &'static str,
        },
        Fail,
        PanicOn(&'static str),
    }

    struct ScriptedProvider {
        script: Script,
        calls: Mutex<u32>,
        call_times: Mutex<Vec<Instant>>,
    }

    impl ScriptedProvider {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script,
                calls: Mutex::new(0),
                call_times: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            *self.calls.lock().unwrap() += 1;
            self.call_times.lock().unwrap().push(Instant::now());
            let prompt = &req.messages[0].content;
            let is_summary = prompt.starts_with("Summarize");
            let content = match &self.script {
                Script::Answer { summary, tags } => {
                    if is_summary { *summary } else { *tags }
                }
                Script::Fail => {
                    return Err(LlmError::RequestFailed {
                        provider: "scripted".into(),
                        reason: "unreachable".into(),
                    });
                }
                Script::PanicOn(subject) => {
                    if prompt.contains(subject) {
                        panic!("model client blew up");
                    }
                    if is_summary { "Fine." } else { "[\"club\"]" }
                }
            };
            Ok(CompletionResponse {
                content: content.to_string(),
                ..Default::default()
            })
        }
    }

    struct NoMail;

    impl MailConnector for NoMail {
        fn connect(&self) -> Result<Box<dyn MailSession>, MailError> {
            Err(MailError::Connect {
                host: "imap.test".into(),
                port: 143,
                reason: "refused".into(),
            })
        }

        fn probe(&self) -> Result<(), MailError> {
            Err(MailError::Closed)
        }
    }

    struct OneMessage;

    struct OneMessageSession;

    impl MailSession for OneMessageSession {
        fn select(&mut self, _: &str) -> Result<(), MailError> {
            Ok(())
        }
        fn search(&mut self, _: &SearchQuery) -> Result<Vec<String>, MailError> {
            Ok(vec!["1".into()])
        }
        fn fetch_message(&mut self, _: &str) -> Result<FetchReply, MailError> {
            Ok(FetchReply::Message(
                b"From: club@uni.edu\r\nSubject: Chess night\r\n\r\nBring a board.\r\n".to_vec(),
            ))
        }
        fn logout(&mut self) -> Result<(), MailError> {
            Ok(())
        }
    }

    impl MailConnector for OneMessage {
        fn connect(&self) -> Result<Box<dyn MailSession>, MailError> {
            Ok(Box::new(OneMessageSession))
        }
        fn probe(&self) -> Result<(), MailError> {
            Ok(())
        }
    }

    fn colors() -> Arc<dyn TagColors> {
        let mut map = HashMap::new();
        map.insert("urgent".to_string(), "#e74c3c".to_string());
        map.insert("club".to_string(), "#3498db".to_string());
        Arc::new(map)
    }

    fn enricher(llm: Arc<ScriptedProvider>, connector: Arc<dyn MailConnector>) -> Enricher {
        enricher_with_cooldown(llm, connector, Duration::ZERO)
    }

    fn enricher_with_cooldown(
        llm: Arc<ScriptedProvider>,
        connector: Arc<dyn MailConnector>,
        cooldown: Duration,
    ) -> Enricher {
        let limiter = Arc::new(RateLimiter::new(cooldown));
        Enricher::new(
            MailFetcher::new(connector),
            Summarizer::new(llm.clone(), Arc::clone(&limiter)),
            Tagger::new(llm, limiter),
            colors(),
        )
    }

    fn message(id: &str, subject: &str) -> RawMessage {
        RawMessage {
            id: id.to_string(),
            sender: "registrar@uni.edu".to_string(),
            subject: subject.to_string(),
            date: "Tue, 7 Oct 2025 10:00:00 +0000".to_string(),
            body: format!("Details about {subject}."),
            unread: true,
        }
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn assembles_summary_and_colored_tags() {
        let llm = ScriptedProvider::new(Script::Answer {
            summary: "Server maintenance tonight.",
            tags: r#"[{"name":"urgent","confidence":0.9},{"name":"research","confidence":0.4}]"#,
        });
        let enricher = enricher(llm.clone(), Arc::new(NoMail));

        let email = enricher.enrich(message("12", "Maintenance")).await;
        assert_eq!(email.id, "12");
        assert_eq!(email.sender, "registrar@uni.edu");
        assert_eq!(email.summary, "Server maintenance tonight.");
        assert_eq!(
            email.tags,
            vec![
                Tag {
                    name: "urgent".into(),
                    confidence: 0.9,
                    color: Some("#e74c3c".into()),
                },
                Tag {
                    name: "research".into(),
                    confidence: 0.4,
                    color: None,
                },
            ]
        );
        assert!(email.unread);
        assert_eq!(*llm.calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn service_failure_uses_component_fallbacks() {
        let llm = ScriptedProvider::new(Script::Fail);
        let enricher = enricher(llm, Arc::new(NoMail));

        let email = enricher.enrich(message("3", "Assignment due Friday")).await;
        assert_eq!(email.summary, SUMMARY_UNAVAILABLE);
        assert_eq!(email.tags.len(), 1);
        assert_eq!(email.tags[0].name, "deadline");
        assert_eq!(email.tags[0].confidence, 1.0);
    }

    #[tokio::test]
    async fn panic_degrades_only_that_message() {
        let llm = ScriptedProvider::new(Script::PanicOn("Broken"));
        let enricher = enricher(llm, Arc::new(NoMail));

        let out = enricher
            .enrich_all(vec![
                message("1", "Chess club"),
                message("2", "Broken"),
                message("3", "Film club"),
            ])
            .await;

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].summary, "Fine.");
        assert_eq!(out[1].id, "2");
        assert_eq!(out[1].subject, "Broken");
        assert_eq!(out[1].summary, DEGRADED_SUMMARY);
        assert!(out[1].tags.is_empty());
        assert_eq!(out[2].tags[0].name, "club");
        assert_eq!(out[2].tags[0].color.as_deref(), Some("#3498db"));
    }

    #[tokio::test]
    async fn provider_calls_spaced_across_messages() {
        let cooldown = Duration::from_millis(40);
        let llm = ScriptedProvider::new(Script::Answer {
            summary: "Noted.",
            tags: r#"["event"]"#,
        });
        let enricher = enricher_with_cooldown(llm.clone(), Arc::new(NoMail), cooldown);

        let out = enricher
            .enrich_all(vec![message("1", "Seminar"), message("2", "Workshop")])
            .await;
        assert_eq!(out.len(), 2);

        let times = llm.call_times.lock().unwrap();
        assert_eq!(times.len(), 4);
        // The limiter stamps just before each call, so allow a little slack.
        let min_gap = cooldown - Duration::from_millis(5);
        for pair in times.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= min_gap, "calls only {gap:?} apart");
        }
    }

    #[tokio::test]
    async fn fail_closed_and_fail_open_paths() {
        let llm = ScriptedProvider::new(Script::Fail);
        let enricher = enricher(llm, Arc::new(NoMail));
        let filter = FetchFilter::default();

        assert!(matches!(
            enricher.fetch_and_enrich(5, &filter).await,
            Err(MailError::Connect { .. })
        ));
        assert!(enricher.fetch_and_enrich_or_empty(5, &filter).await.is_empty());
    }

    #[tokio::test]
    async fn fetch_then_enrich() {
        let llm = ScriptedProvider::new(Script::Answer {
            summary: "Chess night; bring a board.",
            tags: r#"["club", "event"]"#,
        });
        let enricher = enricher(llm, Arc::new(OneMessage));

        let emails = enricher
            .fetch_and_enrich(5, &FetchFilter::default())
            .await
            .unwrap();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].sender, "club@uni.edu");
        assert_eq!(emails[0].subject, "Chess night");
        assert_eq!(emails[0].summary, "Chess night; bring a board.");
        let names: Vec<&str> = emails[0].tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["club", "event"]);
    }

    #[test]
    fn panic_payloads() {
        let boxed: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(boxed.as_ref()), "static str");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
