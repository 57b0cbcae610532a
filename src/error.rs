//! Error type shared by the report pipeline, the run log and the HTTP routes.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    /// The query ran but matched nothing. Read paths treat this as an empty result.
    #[error("No rows found")]
    NoRowsFound,

    #[error("Validation error: {0}")]
    Validation(String),

    /// A database failure surfaced to the caller as its message.
    #[error("Query error: {0}")]
    Query(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Could not create file {}: {source}", .path.display())]
    FileCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type ReportResult<T> = Result<T, ReportError>;

impl ReportError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl IntoResponse for ReportError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ReportError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ReportError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ReportError::NoRowsFound => (StatusCode::NOT_FOUND, self.to_string()),
            ReportError::Query(msg) => {
                tracing::error!("Query error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            ReportError::Mail(msg) => {
                tracing::error!("Mail error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Mail transport failed".to_string())
            }
            _ => {
                tracing::error!("Unhandled error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "error": message,
        }));

        (status, body).into_response()
    }
}
