//! Stream bridge.
//!
//! Drains an upstream [`EventStream`] and re-emits every item as exactly one
//! [`OutboundEvent`], in receipt order. The bridge holds at most one event at
//! a time and owns the upstream stream: when the bridge is dropped (client
//! gone) or finishes, the upstream stream is dropped with it.

use std::convert::Infallible;

use axum::response::sse::Event;
use futures::stream::{self, Stream, StreamExt};

use crate::upstream::{EventStream, StreamEvent};

/// Data sent for an upstream `Unknown` event.
pub const UNKNOWN_EVENT_MARKER: &str = "unknown event";
/// Data sent for any other unrecognised upstream event.
pub const UNEXPECTED_EVENT_MARKER: &str = "unexpected event type";
/// Data sent once before closing when the upstream stream fails.
pub const STREAM_INTERRUPTED_MARKER: &str = "stream interrupted";

/// A client-facing SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    Message(String),
    Error(String),
}

impl OutboundEvent {
    /// SSE `event:` name.
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::Message(_) => "message",
            OutboundEvent::Error(_) => "error",
        }
    }

    pub fn data(&self) -> &str {
        match self {
            OutboundEvent::Message(data) | OutboundEvent::Error(data) => data,
        }
    }

    /// Render as an axum SSE event.
    ///
    /// SSE fields cannot carry carriage returns, so CRLF and lone CR become
    /// LF; axum then splits multi-line data into several `data:` lines.
    pub fn into_sse(self) -> Event {
        let name = self.name();
        let data = normalize_newlines(self.data());
        Event::default().event(name).data(data)
    }
}

fn normalize_newlines(data: &str) -> String {
    if data.contains('\r') {
        data.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        data.to_string()
    }
}

/// Translate one upstream event.
pub fn map_event(event: StreamEvent) -> OutboundEvent {
    match event {
        StreamEvent::Chunk(payload) => {
            OutboundEvent::Message(String::from_utf8_lossy(&payload).into_owned())
        }
        StreamEvent::Unknown => OutboundEvent::Error(UNKNOWN_EVENT_MARKER.to_string()),
        StreamEvent::Error(detail) => {
            tracing::warn!(detail = %detail, "Unexpected event type from model stream");
            OutboundEvent::Error(UNEXPECTED_EVENT_MARKER.to_string())
        }
    }
}

/// Per-request bridge state, moved through the unfold.
struct BridgeState {
    /// `None` once the exchange has ended.
    source: Option<EventStream>,
    request_id: String,
    messages: u64,
    errors: u64,
}

impl BridgeState {
    fn record(&mut self, outbound: &OutboundEvent) {
        match outbound {
            OutboundEvent::Message(_) => self.messages += 1,
            OutboundEvent::Error(_) => self.errors += 1,
        }
    }

    /// Drop the upstream stream.
    fn close(&mut self) {
        self.source = None;
    }
}

impl Drop for BridgeState {
    fn drop(&mut self) {
        if self.source.is_some() {
            tracing::info!(
                request_id = %self.request_id,
                messages = self.messages,
                errors = self.errors,
                "Client disconnected before model stream ended, closing upstream"
            );
        }
    }
}

/// Forward `source` one event at a time.
///
/// Ends when the source is exhausted, or after a single
/// [`STREAM_INTERRUPTED_MARKER`] error event if reading the source fails.
pub fn bridge(
    source: EventStream,
    request_id: impl Into<String>,
) -> impl Stream<Item = OutboundEvent> + Send + 'static {
    let state = BridgeState {
        source: Some(source),
        request_id: request_id.into(),
        messages: 0,
        errors: 0,
    };

    stream::unfold(state, |mut state| async move {
        let Some(source) = state.source.as_mut() else {
            return None;
        };

        match source.next().await {
            Some(Ok(event)) => {
                let outbound = map_event(event);
                state.record(&outbound);
                Some((outbound, state))
            }
            Some(Err(e)) => {
                state.close();
                let outbound = OutboundEvent::Error(STREAM_INTERRUPTED_MARKER.to_string());
                state.record(&outbound);
                tracing::error!(
                    request_id = %state.request_id,
                    error = %e,
                    messages = state.messages,
                    "Model stream failed mid-response"
                );
                Some((outbound, state))
            }
            None => {
                state.close();
                tracing::info!(
                    request_id = %state.request_id,
                    messages = state.messages,
                    errors = state.errors,
                    "Model stream completed"
                );
                None
            }
        }
    })
}

/// [`bridge`] rendered as SSE events for `axum::response::sse::Sse`.
pub fn sse_events(
    source: EventStream,
    request_id: impl Into<String>,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    bridge(source, request_id).map(|event| Ok(event.into_sse()))
}
