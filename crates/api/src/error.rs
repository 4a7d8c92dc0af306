use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use roster_core::error::CoreError;
use roster_db::StoreError;
use roster_directory::DirectoryError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`DirectoryError`]. Implements [`IntoResponse`] to produce
/// consistent JSON error responses of the form
/// `{"error": <message>, "code": <CODE>}`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// An error from the user directory service.
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Directory(err) => classify_directory_error(err),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Classify a directory error into an HTTP status, error code, and message.
///
/// Store failures other than timeouts and duplicates are logged and
/// reported with a sanitized message.
fn classify_directory_error(err: &DirectoryError) -> (StatusCode, &'static str, String) {
    match err {
        DirectoryError::Core(core) => match core {
            CoreError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            CoreError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal core error");
                internal()
            }
        },

        DirectoryError::Hashing(_) => (StatusCode::BAD_REQUEST, "HASHING_ERROR", err.to_string()),

        DirectoryError::Persistence(store) => match store {
            StoreError::Timeout(limit) => {
                tracing::error!(timeout = ?limit, "Store timed out");
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "STORE_TIMEOUT",
                    "The user store did not respond in time".to_string(),
                )
            }
            StoreError::Duplicate(id) => (
                StatusCode::CONFLICT,
                "CONFLICT",
                format!("User with id {id} already exists"),
            ),
            other => {
                tracing::error!(error = %other, "Store error");
                internal()
            }
        },
    }
}

fn internal() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}
