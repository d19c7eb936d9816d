//! http_get tool - fetch a URL as text

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::arg_f64;
use crate::tools::{Tool, ToolContext, ToolResult};

const MAX_BODY_BYTES: usize = 1_000_000;

/// Send an HTTP GET request and return the body
pub struct HttpGetTool;

#[async_trait]
impl Tool for HttpGetTool {
    fn name(&self) -> &'static str {
        "http_get"
    }

    fn description(&self) -> &'static str {
        "Send a HTTP GET request with timeout and basic error handling"
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "the URL to send the GET request to"
                },
                "timeout": {
                    "type": "number",
                    "description": "the timeout for the request in seconds (default: 10.0)"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "HttpGetTool::execute: called");
        let url = match input["url"].as_str() {
            Some(u) => u,
            None => return ToolResult::error("url is required"),
        };

        if !url.starts_with("http://") && !url.starts_with("https://") {
            debug!(%url, "HttpGetTool::execute: unsupported scheme");
            return ToolResult::error("URL must start with http:// or https://");
        }

        let timeout = arg_f64(&input, "timeout")
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .filter(|d| !d.is_zero())
            .unwrap_or(ctx.limits.http_timeout);

        let client = match reqwest::Client::builder().timeout(timeout).build() {
            Ok(c) => c,
            Err(e) => return ToolResult::error(format!("HTTP GET error: {}", e)),
        };

        let response = match client.get(url).send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return ToolResult::error(format!("HTTP GET timeout: {}", e)),
            Err(e) if e.is_connect() => return ToolResult::error(format!("HTTP GET connection error: {}", e)),
            Err(e) => return ToolResult::error(format!("HTTP GET request error: {}", e)),
        };

        let status = response.status();
        if !status.is_success() {
            debug!(%status, "HttpGetTool::execute: non-success status");
            return ToolResult::error(format!("HTTP GET status error: {}", status));
        }

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return ToolResult::error(format!("Failed to read response: {}", e)),
        };

        if body.len() > MAX_BODY_BYTES {
            return ToolResult::error("Response too large (> 1MB)");
        }

        ToolResult::success(body)
    }
}
