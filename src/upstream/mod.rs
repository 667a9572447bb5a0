//! Upstream model provider module.
//!
//! Defines the [`ModelInvoker`] seam between the HTTP layer and whatever
//! opens the streaming inference call, plus the event and error types that
//! cross it. [`BedrockInvoker`] is the production implementation.

mod bedrock;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::proxy::types::ModelInvocationParameters;

pub use bedrock::BedrockInvoker;

/// One item of the provider's response stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A fragment of generated output.
    Chunk(Bytes),
    /// The provider sent a union member this client does not model.
    Unknown,
    /// Any other provider event, with a description for the logs.
    Error(String),
}

/// A mid-stream failure after the stream was established. Terminal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Upstream stream failed: {message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure to establish the upstream stream. Nothing has been sent to the
/// HTTP caller when this is returned.
#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    #[error("Timed out after {0:?} waiting for the model stream to open")]
    Timeout(Duration),

    #[error("Failed to serialize model request: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Provider rejected the invocation: {0}")]
    Rejected(String),
}

/// Live, single-pass sequence of provider events.
///
/// Dropping the stream releases the underlying connection.
pub type EventStream = BoxStream<'static, Result<StreamEvent, TransportError>>;

/// Opens streaming inference calls.
///
/// Implementations are shared read-only across requests; every call opens an
/// independent stream.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn open_stream(
        &self,
        params: &ModelInvocationParameters,
    ) -> Result<EventStream, InvocationError>;
}

/// Open a stream, giving up after `timeout` if one is set.
pub async fn open_with_timeout(
    invoker: &dyn ModelInvoker,
    params: &ModelInvocationParameters,
    timeout: Option<Duration>,
) -> Result<EventStream, InvocationError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, invoker.open_stream(params))
            .await
            .map_err(|_| InvocationError::Timeout(limit))?,
        None => invoker.open_stream(params).await,
    }
}
