use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("{subject} is full ({count}/{capacity})")]
    CapacityExceeded {
        subject: String,
        count: usize,
        capacity: usize,
    },

    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::InvalidState(_) => "invalid_state",
            AppError::CapacityExceeded { .. } => "capacity_exceeded",
            AppError::MissingField(_) => "missing_field",
            AppError::BadRequest(_) => "bad_request",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn missing(field: &str) -> Self {
        AppError::MissingField(field.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let message = self.to_string();

        let (status, body) = match &self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, json!({ "error": message, "kind": kind })),
            AppError::InvalidState(_) => (StatusCode::CONFLICT, json!({ "error": message, "kind": kind })),
            AppError::CapacityExceeded {
                subject,
                count,
                capacity,
            } => (
                StatusCode::CONFLICT,
                json!({
                    "error": message,
                    "kind": kind,
                    "subject": subject,
                    "count": count,
                    "capacity": capacity,
                }),
            ),
            AppError::MissingField(field) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": message, "kind": kind, "field": field }),
            ),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, json!({ "error": message, "kind": kind })),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": message, "kind": kind }),
            ),
        };

        (status, Json(body)).into_response()
    }
}
