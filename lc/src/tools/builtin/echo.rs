//! echo tool - return the input text

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::{Tool, ToolContext, ToolResult};

pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn description(&self) -> &'static str {
        "Echo the input text"
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "the text to echo"
                }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        let text = match &input["text"] {
            Value::String(s) => s.clone(),
            Value::Null => return ToolResult::error("text is required"),
            other => other.to_string(),
        };

        if text.chars().count() > ctx.limits.echo_max_chars {
            return ToolResult::error("Text is too large");
        }
        ToolResult::success(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo() {
        let ctx = ToolContext::new(std::env::temp_dir(), "test");
        let result = EchoTool.execute(serde_json::json!({"text": "hi"}), &ctx).await;
        assert!(!result.is_error);
        assert_eq!(result.content, "hi");
    }

    #[tokio::test]
    async fn test_echo_non_string_is_rendered() {
        let ctx = ToolContext::new(std::env::temp_dir(), "test");
        let result = EchoTool.execute(serde_json::json!({"text": 42}), &ctx).await;
        assert_eq!(result.content, "42");
    }

    #[tokio::test]
    async fn test_echo_too_large() {
        let ctx = ToolContext::new(std::env::temp_dir(), "test");
        let result = EchoTool
            .execute(serde_json::json!({"text": "x".repeat(4001)}), &ctx)
            .await;
        assert!(result.is_error);
    }
}
