//! Shared helpers for integration tests: a scripted model invoker and SSE
//! body parsing.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};

use bedrock_relay::config::Config;
use bedrock_relay::proxy::{create_router, AppState, ModelInvocationParameters};
use bedrock_relay::upstream::{
    EventStream, InvocationError, ModelInvoker, StreamEvent, TransportError,
};

/// What the scripted upstream does when opened.
#[derive(Clone)]
pub enum Script {
    /// Yield these items, then end the stream.
    Events(Vec<Result<StreamEvent, TransportError>>),
    /// Yield these items, then stay open without producing anything.
    HoldOpen(Vec<Result<StreamEvent, TransportError>>),
    /// Fail to establish the stream.
    FailToOpen,
    /// Wait this long before yielding an empty stream.
    Delay(Duration),
}

/// Sets the shared flag when the upstream stream is dropped.
struct ReleaseGuard(Arc<AtomicBool>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Test double for the upstream client.
///
/// Records every invocation and whether the last opened stream was released.
pub struct ScriptedInvoker {
    script: Script,
    calls: AtomicUsize,
    last_params: Mutex<Option<ModelInvocationParameters>>,
    released: Arc<AtomicBool>,
}

impl ScriptedInvoker {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
            last_params: Mutex::new(None),
            released: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_params(&self) -> Option<ModelInvocationParameters> {
        self.last_params.lock().unwrap().clone()
    }

    pub fn released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    fn scripted_stream(
        &self,
        items: Vec<Result<StreamEvent, TransportError>>,
        hold_open: bool,
    ) -> EventStream {
        let guard = ReleaseGuard(self.released.clone());
        stream::unfold(
            (stream::iter(items), guard),
            move |(mut items, guard)| async move {
                match items.next().await {
                    Some(item) => Some((item, (items, guard))),
                    None if hold_open => futures::future::pending().await,
                    None => None,
                }
            },
        )
        .boxed()
    }
}

#[async_trait]
impl ModelInvoker for ScriptedInvoker {
    async fn open_stream(
        &self,
        params: &ModelInvocationParameters,
    ) -> Result<EventStream, InvocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_params.lock().unwrap() = Some(params.clone());

        match &self.script {
            Script::Events(items) => Ok(self.scripted_stream(items.clone(), false)),
            Script::HoldOpen(items) => Ok(self.scripted_stream(items.clone(), true)),
            Script::FailToOpen => Err(InvocationError::Rejected(
                "AccessDeniedException: scripted".to_string(),
            )),
            Script::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(self.scripted_stream(Vec::new(), false))
            }
        }
    }
}

pub fn chunk(text: &str) -> Result<StreamEvent, TransportError> {
    Ok(StreamEvent::Chunk(Bytes::from(text.to_string())))
}

/// Build the relay router around `invoker`.
pub fn test_app(invoker: Arc<ScriptedInvoker>, config: Config) -> axum::Router {
    let state = AppState {
        invoker,
        config: Arc::new(config),
    };
    create_router(state)
}

/// One parsed SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

impl SseFrame {
    pub fn message(data: &str) -> Self {
        Self {
            event: "message".to_string(),
            data: data.to_string(),
        }
    }

    pub fn error(data: &str) -> Self {
        Self {
            event: "error".to_string(),
            data: data.to_string(),
        }
    }
}

fn field_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(name)?.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

/// Parse an SSE body into frames, skipping comment (keep-alive) lines.
pub fn parse_sse(body: &str) -> Vec<SseFrame> {
    body.split("\n\n")
        .filter_map(|block| {
            let mut event = None;
            let mut data: Vec<&str> = Vec::new();
            for line in block.lines() {
                if line.starts_with(':') {
                    continue;
                }
                if let Some(value) = field_value(line, "event") {
                    event = Some(value.to_string());
                } else if let Some(value) = field_value(line, "data") {
                    data.push(value);
                }
            }
            if event.is_none() && data.is_empty() {
                return None;
            }
            Some(SseFrame {
                event: event.unwrap_or_else(|| "message".to_string()),
                data: data.join("\n"),
            })
        })
        .collect()
}
