//! Tag management endpoints.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use super::{ApiError, AppState};

pub async fn list_tags(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.tags.details())
}

pub async fn tags_by_category(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.tags.by_category())
}

#[derive(Debug, Deserialize)]
pub struct NewTag {
    name: String,
}

pub async fn add_tag(
    State(state): State<AppState>,
    Json(body): Json<NewTag>,
) -> Result<impl IntoResponse, ApiError> {
    let name = state.tags.add_tag(&body.name).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "name": name })),
    ))
}

pub async fn remove_tag(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.tags.remove_tag(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ColorUpdate {
    color: String,
}

pub async fn set_color(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<ColorUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    state.tags.set_color(&name, &body.color).await?;
    let name = name.trim().to_lowercase();
    Ok(Json(serde_json::json!({
        "name": name,
        "color": body.color.trim()
    })))
}
