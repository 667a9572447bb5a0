//! Error types for bedrock-relay.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::proxy::types::ValidationError;
use crate::upstream::InvocationError;

/// Body text returned when the upstream stream cannot be opened.
pub const INVOCATION_FAILED_MESSAGE: &str = "Failed to invoke model";

/// Request-path error type for bedrock-relay.
///
/// Startup failures (config, client construction) surface through `anyhow`
/// in `main` and never reach a handler.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Model invocation failed: {0}")]
    InvocationFailed(#[from] InvocationError),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Upstream causes are logged where they occur and never echoed to callers.
        let (status, message) = match &self {
            Error::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            Error::InvocationFailed(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                INVOCATION_FAILED_MESSAGE.to_string(),
            ),
        };

        let body = serde_json::json!({ "error": message });

        (status, axum::Json(body)).into_response()
    }
}
