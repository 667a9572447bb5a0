//! Request types for the generate endpoint and the Titan text model.

use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;

/// Reasons an inbound body is rejected before any upstream call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid request body")]
    MalformedBody,

    #[error("Prompt cannot be empty")]
    EmptyPrompt,
}

/// Wire shape of the inbound body. Extra fields are ignored.
#[derive(Debug, Deserialize)]
struct PromptBody {
    #[serde(default)]
    prompt: Option<String>,
}

/// A validated prompt from `POST /generate-text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    prompt: String,
}

impl PromptRequest {
    /// Parse and validate a raw request body.
    ///
    /// Only the empty string counts as an empty prompt; whitespace is passed
    /// through to the model untouched.
    pub fn from_body(body: &[u8]) -> Result<Self, ValidationError> {
        let parsed: PromptBody =
            serde_json::from_slice(body).map_err(|_| ValidationError::MalformedBody)?;

        match parsed.prompt {
            Some(prompt) if !prompt.is_empty() => Ok(Self { prompt }),
            _ => Err(ValidationError::EmptyPrompt),
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn into_prompt(self) -> String {
        self.prompt
    }
}

/// Titan `textGenerationConfig` block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextGenerationConfig {
    pub max_token_count: u32,
    pub stop_sequences: Vec<String>,
    pub temperature: f32,
    pub top_p: f32,
}

/// Titan text request body, as sent to `InvokeModelWithResponseStream`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitanRequestBody {
    pub input_text: String,
    pub text_generation_config: TextGenerationConfig,
}

/// Everything needed to open one upstream stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInvocationParameters {
    pub model_id: String,
    pub content_type: String,
    pub accept: String,
    pub input_text: String,
    pub generation: TextGenerationConfig,
}

impl ModelInvocationParameters {
    /// Combine a validated prompt with the configured model defaults.
    pub fn new(model: &ModelConfig, request: PromptRequest) -> Self {
        Self {
            model_id: model.id.clone(),
            content_type: model.content_type.clone(),
            accept: model.accept.clone(),
            input_text: request.into_prompt(),
            generation: TextGenerationConfig {
                max_token_count: model.max_token_count,
                stop_sequences: model.stop_sequences.clone(),
                temperature: model.temperature,
                top_p: model.top_p,
            },
        }
    }

    /// Serialize the provider request body.
    pub fn body(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&TitanRequestBody {
            input_text: self.input_text.clone(),
            text_generation_config: self.generation.clone(),
        })
    }
}
