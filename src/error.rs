use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::models::ConflictDetails;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error(
        "Conflict: allocation of {}% would over-commit resource {} ({} conflicting allocation(s), {}% available)",
        .0.requested_percentage,
        .0.resource_id,
        .0.conflict_count,
        .0.available_capacity
    )]
    Conflict(Box<ConflictDetails>),

    #[error("{0}")]
    Internal(String),

    #[error("{0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Validation(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, body) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Conflict(details) => (
                StatusCode::CONFLICT,
                json!({
                    "error": message,
                    "details": details,
                }),
            ),
            AppError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, json!({ "error": msg })),
            AppError::Database(e) => {
                tracing::error!(error = %e, "Repository failure");
                (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": e.to_string() }))
            }
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg })),
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
