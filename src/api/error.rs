//! HTTP error responses: a status code and a `{"detail": ...}` body.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::{MailError, TagStoreError};

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<MailError> for ApiError {
    fn from(e: MailError) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Email server error: {}", e),
        )
    }
}

impl From<TagStoreError> for ApiError {
    fn from(e: TagStoreError) -> Self {
        let status = match &e {
            TagStoreError::InvalidName(_)
            | TagStoreError::InvalidColor(_)
            | TagStoreError::StandardTag(_) => StatusCode::BAD_REQUEST,
            TagStoreError::UnknownTag(_) => StatusCode::NOT_FOUND,
            TagStoreError::Serialization(_) | TagStoreError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, detail = %self.detail, "Request failed");
        }
        (self.status, Json(serde_json::json!({ "detail": self.detail }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mail_errors_are_server_errors() {
        let err = ApiError::from(MailError::Login("bad password".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.detail.starts_with("Email server error: "));
        assert!(err.detail.contains("bad password"));
    }

    #[test]
    fn tag_store_error_statuses() {
        let cases = [
            (TagStoreError::InvalidName(" ".into()), StatusCode::BAD_REQUEST),
            (TagStoreError::InvalidColor("red".into()), StatusCode::BAD_REQUEST),
            (TagStoreError::StandardTag("urgent".into()), StatusCode::BAD_REQUEST),
            (TagStoreError::UnknownTag("x".into()), StatusCode::NOT_FOUND),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }
}
