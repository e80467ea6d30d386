use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationErrors(#[from] validator::ValidationErrors),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),

    #[error("Database error")]
    Database(#[source] anyhow::Error),

    #[error("Configuration error: {0}")]
    Config(anyhow::Error),
}

impl AppError {
    /// Unauthorized with the generic hint used whenever the real cause
    /// must not reach the caller.
    pub fn unauthenticated() -> Self {
        AppError::Unauthorized("Authentication required".to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(anyhow::Error::new(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            event_id: Option<String>,
        }

        let (status, error_message, details, event_id) = match self {
            AppError::ValidationErrors(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Validation error".to_string(),
                Some(err.to_string()),
                None,
            ),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg, None, None),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, None, None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None, None),
            AppError::AlreadyExists(msg) => (StatusCode::CONFLICT, msg, None, None),
            AppError::Internal(err) | AppError::Database(err) | AppError::Config(err) => {
                // Full detail stays server-side; the caller only gets an
                // opaque reference they can quote back to us.
                let event_id = Uuid::new_v4();
                tracing::error!(event_id = %event_id, error = ?err, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                    Some(event_id.to_string()),
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: error_message,
                details,
                event_id,
            }),
        )
            .into_response()
    }
}
