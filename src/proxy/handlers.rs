//! HTTP request handlers.

use axum::{
    body::Bytes,
    extract::{Extension, State},
    response::{
        sse::{KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};

use super::server::{AppState, RequestId};
use super::stream::sse_events;
use super::types::{ModelInvocationParameters, PromptRequest};
use crate::error::Error;
use crate::upstream::open_with_timeout;

/// Handle POST /generate-text
///
/// Validation and stream establishment both finish before any response
/// bytes exist, so their failures are plain JSON errors. Once the upstream
/// stream is open the response is committed to `200 text/event-stream`.
pub async fn generate_text(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    body: Bytes,
) -> Result<Response, Error> {
    let request_id = request_id.0.to_string();

    let request = PromptRequest::from_body(&body).map_err(|e| {
        tracing::warn!(request_id = %request_id, reason = %e, "Rejected generate request");
        e
    })?;

    tracing::info!(
        request_id = %request_id,
        prompt_chars = request.prompt().chars().count(),
        "Received generate request"
    );

    let params = ModelInvocationParameters::new(&state.config.model, request);

    let source = open_with_timeout(
        state.invoker.as_ref(),
        &params,
        state.config.upstream.open_timeout(),
    )
    .await
    .map_err(|e| {
        tracing::error!(
            request_id = %request_id,
            model = %params.model_id,
            error = %e,
            "Failed to open model stream"
        );
        e
    })?;

    tracing::debug!(request_id = %request_id, model = %params.model_id, "Streaming response");

    let keep_alive = KeepAlive::new().interval(state.config.server.keep_alive());
    Ok(Sse::new(sse_events(source, request_id))
        .keep_alive(keep_alive)
        .into_response())
}

/// Handle GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "bedrock-relay",
        "model": state.config.model.id,
    }))
}
