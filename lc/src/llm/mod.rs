//! LLM client module
//!
//! The compiler talks to the model only through [`LlmClient`].

use std::sync::Arc;

use tracing::debug;

pub mod client;
mod error;
mod openai;
mod types;

pub use client::LlmClient;
pub use error::LlmError;
pub use openai::{OpenAIClient, SamplingParams};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, TokenUsage};

use crate::config::LlmConfig;

/// Create the LLM client described by the config
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(model = %config.model, "create_client: called");
    Ok(Arc::new(OpenAIClient::from_config(config)?))
}
