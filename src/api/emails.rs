//! Email endpoints: fetch, filtered search, health and reply suggestions.

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;

use super::{ApiError, AppState};
use crate::enrich::EnrichedEmail;
use crate::mail::FetchFilter;

const DEFAULT_FETCH_LIMIT: usize = 5;
const DEFAULT_SEARCH_LIMIT: usize = 10;

// ── Service info ────────────────────────────────────────────────────────

pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "Grey Mail API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": [
            "/fetch-emails",
            "/search-emails",
            "/smart-replies",
            "/tags",
            "/health"
        ]
    }))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let (healthy, mail) = match state.enricher.fetcher().probe().await {
        Ok(()) => (true, "connected".to_string()),
        Err(e) => (false, format!("error: {}", e)),
    };
    let ai = if state.llm.is_configured() {
        "available"
    } else {
        "unconfigured"
    };

    Json(serde_json::json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "services": {
            "mail": mail,
            "ai": ai
        },
        "time": chrono::Utc::now().to_rfc3339()
    }))
}

// ── Emails ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FetchParams {
    #[serde(default = "default_fetch_limit")]
    limit: usize,
    #[serde(default)]
    unread_only: bool,
}

fn default_fetch_limit() -> usize {
    DEFAULT_FETCH_LIMIT
}

/// Fetch and enrich the newest messages. Mail failures are a 500.
pub async fn fetch_emails(
    State(state): State<AppState>,
    Query(params): Query<FetchParams>,
) -> Result<Json<Vec<EnrichedEmail>>, ApiError> {
    info!(limit = params.limit, unread_only = params.unread_only, "Fetching emails");
    let filter = if params.unread_only {
        FetchFilter::unread_only()
    } else {
        FetchFilter::default()
    };
    let emails = state.enricher.fetch_and_enrich(params.limit, &filter).await?;
    Ok(Json(emails))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default = "default_search_limit")]
    limit: usize,
    folder: Option<String>,
    from: Option<String>,
    subject: Option<String>,
    #[serde(default)]
    unread: bool,
}

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

/// Filtered fetch. Mail failures yield an empty list.
pub async fn search_emails(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<Vec<EnrichedEmail>> {
    let filter = FetchFilter {
        folder: params.folder,
        unread: params.unread,
        from: params.from,
        subject: params.subject,
    };
    info!(limit = params.limit, folder = filter.folder(), "Searching emails");
    Json(
        state
            .enricher
            .fetch_and_enrich_or_empty(params.limit, &filter)
            .await,
    )
}

// ── Smart replies ───────────────────────────────────────────────────────

/// Tags may arrive as plain names or as tag objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TagRef {
    Name(String),
    Tag { name: String },
}

impl TagRef {
    fn into_name(self) -> String {
        match self {
            TagRef::Name(name) | TagRef::Tag { name } => name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SmartReplyRequest {
    content: String,
    #[serde(default)]
    tags: Vec<TagRef>,
}

pub async fn smart_replies(
    State(state): State<AppState>,
    Json(body): Json<SmartReplyRequest>,
) -> impl IntoResponse {
    let tags: Vec<String> = body.tags.into_iter().map(TagRef::into_name).collect();
    let replies = state.replier.suggest(&body.content, &tags).await;
    Json(serde_json::json!({ "replies": replies }))
}
