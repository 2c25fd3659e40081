use std::any::Any;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ehco_core::error::CodecError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CodecError`] for job failures and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error bodies:
///
/// ```json
/// { "success": false, "error": "...", "code": "...", "details": "...", "command": "..." }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A job failure from `ehco_core`.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A malformed request (e.g. unreadable multipart body).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, summary, details, command) = match &self {
            AppError::Codec(err) => {
                let (status, summary) = classify_codec_error(err);
                (
                    status,
                    err.code(),
                    summary,
                    codec_details(err),
                    err.command().map(str::to_string),
                )
            }
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                "Bad request",
                msg.clone(),
                None,
            ),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let mut body = json!({
            "success": false,
            "error": summary,
            "code": code,
            "details": details,
        });
        if let Some(command) = command {
            body["command"] = json!(command);
        }

        (status, axum::Json(body)).into_response()
    }
}

/// Panic handler for `CatchPanicLayer`: a panicking handler still answers
/// with the standard JSON error body.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };
    AppError::InternalError(format!("handler panicked: {message}")).into_response()
}

/// Map a [`CodecError`] to an HTTP status and a short summary.
///
/// - Upload validation problems are the client's fault (400).
/// - A tool that cannot be started is a service fault (500).
/// - A tool that ran but misbehaved is an upstream fault (502 / 504).
fn classify_codec_error(err: &CodecError) -> (StatusCode, &'static str) {
    match err {
        CodecError::NoFileUploaded => (StatusCode::BAD_REQUEST, "No file uploaded"),
        CodecError::WrongFileCount { .. } => (StatusCode::BAD_REQUEST, "Wrong number of files"),
        CodecError::ToolInvocation { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Codec tool could not be started",
        ),
        CodecError::ToolExecution { .. } => (StatusCode::BAD_GATEWAY, "Codec tool failed"),
        CodecError::ToolTimeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "Codec tool timed out"),
        CodecError::ArtifactNotProduced { .. } => {
            (StatusCode::BAD_GATEWAY, "Codec tool produced no output")
        }
        CodecError::EmptyArtifact { .. } => {
            (StatusCode::BAD_GATEWAY, "Codec tool produced an empty file")
        }
        CodecError::MetricsUnavailable(_) => {
            (StatusCode::BAD_GATEWAY, "Metrics could not be computed")
        }
        CodecError::Filesystem { .. } | CodecError::InvalidTransition { .. } => {
            tracing::error!(error = %err, "Internal job error");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

/// Human-readable detail. Filesystem errors report only what was being
/// done, never the underlying OS paths.
fn codec_details(err: &CodecError) -> String {
    match err {
        CodecError::Filesystem { context, .. } => {
            format!("Filesystem operation failed while {context}")
        }
        CodecError::InvalidTransition { .. } => "An internal error occurred".to_string(),
        other => other.to_string(),
    }
}
