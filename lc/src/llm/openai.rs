//! OpenAI-compatible chat completion client
//!
//! Posts to `<base-url>/chat/completions`, so any server that speaks the
//! Chat Completions API works. Transient failures are retried with
//! exponential backoff.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, Role, StopReason, TokenUsage};
use crate::config::LlmConfig;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Longest server-requested wait we honor between attempts
const MAX_RETRY_AFTER_SECS: u64 = 60;

/// Sampling parameters sent with every request
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
}

/// OpenAI API client
pub struct OpenAIClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
    max_retries: u32,
    initial_backoff: Duration,
    timeout: Duration,
    sampling: SamplingParams,
}

impl OpenAIClient {
    /// Create a client; the API key is read from the env var the config names
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(model = %config.model, base_url = %config.base_url, "OpenAIClient::from_config: called");
        let api_key = config
            .api_key()
            .ok_or_else(|| LlmError::MissingApiKey(config.api_key_env.clone()))?;

        let timeout = Duration::from_secs(config.timeout_seconds);
        let http = Client::builder().timeout(timeout).build().map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
            timeout,
            sampling: SamplingParams {
                temperature: config.temperature,
                top_p: config.top_p,
                frequency_penalty: config.frequency_penalty,
            },
        })
    }

    /// Build the request body for the chat completions endpoint
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(model = %self.model, max_tokens = %request.max_tokens, "build_request_body: called");
        let mut messages = vec![serde_json::json!({
            "role": "system",
            "content": request.system_prompt,
        })];
        messages.extend(request.messages.iter().map(|m| {
            let role = match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            serde_json::json!({ "role": role, "content": m.content })
        }));

        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": request.max_tokens.min(self.max_tokens),
            "temperature": self.sampling.temperature,
            "top_p": self.sampling.top_p,
            "frequency_penalty": self.sampling.frequency_penalty,
        })
    }

    fn parse_response(api_response: OpenAIResponse) -> CompletionResponse {
        debug!(choices = api_response.choices.len(), "parse_response: called");
        let (content, stop_reason) = match api_response.choices.into_iter().next() {
            Some(choice) => {
                let stop_reason = match choice.finish_reason.as_deref() {
                    Some("length") => StopReason::MaxTokens,
                    Some("content_filter") => StopReason::ContentFilter,
                    _ => StopReason::EndTurn,
                };
                (choice.message.content, stop_reason)
            }
            None => (None, StopReason::EndTurn),
        };

        let usage = api_response
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        CompletionResponse {
            content,
            stop_reason,
            usage,
        }
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        self.initial_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// One POST to the completions endpoint, with failures mapped to `LlmError`
    async fn send_once(
        &self,
        url: &str,
        body: &serde_json::Value,
        attempt: u32,
    ) -> Result<CompletionResponse, LlmError> {
        let response = self
            .http
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout)
                } else {
                    LlmError::Network(e)
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(|secs| Duration::from_secs(secs.min(MAX_RETRY_AFTER_SECS)))
                .unwrap_or_else(|| self.backoff_for(attempt + 1));
            return Err(LlmError::RateLimited { retry_after });
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let text = response.text().await?;
        let api_response: OpenAIResponse = serde_json::from_str(&text)?;
        Ok(Self::parse_response(api_response))
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(model = %self.model, "OpenAIClient::complete: called");
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request_body(&request);

        let mut attempt = 0;
        loop {
            match self.send_once(&url, &body, attempt).await {
                Ok(response) => {
                    debug!(attempt, "complete: success");
                    return Ok(response);
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let wait = e.retry_after().unwrap_or_else(|| self.backoff_for(attempt));
                    let wait_ms = wait.as_millis() as u64;
                    if e.is_rate_limit() {
                        warn!(attempt, wait_ms, "complete: rate limited, waiting");
                    } else {
                        warn!(attempt, wait_ms, error = %e, "complete: retrying after transient error");
                    }
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    debug!(attempt, error = %e, "complete: giving up");
                    return Err(e);
                }
            }
        }
    }
}

// Chat Completions response types

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}
