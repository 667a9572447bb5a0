//! bedrock-relay - stream Amazon Bedrock completions to HTTP clients
//!
//! This library provides the core functionality for the relay: configuration,
//! the upstream model client, and the SSE bridge between the two.

pub mod config;
pub mod error;
pub mod proxy;
pub mod upstream;

pub use config::Config;
pub use error::Error;
