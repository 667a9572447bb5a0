//! HTTP relay module.
//!
//! This module provides the `/generate-text` endpoint that validates a
//! prompt, opens a model stream and bridges it to the caller as SSE.

mod handlers;
mod server;
pub mod stream;
pub mod types;

pub use server::{create_router, run_server, AppState, RequestId, REQUEST_ID_HEADER};
pub use stream::{bridge, sse_events, OutboundEvent};
pub use types::{ModelInvocationParameters, PromptRequest, TextGenerationConfig, ValidationError};
