//! HTTP API.

pub mod emails;
pub mod error;
pub mod tags;

pub use error::ApiError;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use tower_http::cors::CorsLayer;

use crate::enrich::{Enricher, SmartReplier};
use crate::llm::LlmProvider;
use crate::tags::TagStore;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub enricher: Arc<Enricher>,
    pub replier: Arc<SmartReplier>,
    pub tags: Arc<TagStore>,
    /// Only consulted for health reporting.
    pub llm: Arc<dyn LlmProvider>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(emails::root))
        .route("/health", get(emails::health))
        .route("/fetch-emails", get(emails::fetch_emails))
        .route("/search-emails", get(emails::search_emails))
        .route("/smart-replies", post(emails::smart_replies))
        .route("/tags", get(tags::list_tags).post(tags::add_tag))
        .route("/tags/categories", get(tags::tags_by_category))
        .route("/tags/{name}", delete(tags::remove_tag))
        .route("/tags/{name}/color", put(tags::set_color))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
