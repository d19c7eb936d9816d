//! read_file tool - read a text file with a size limit

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

use super::arg_u64;
use crate::tools::{Tool, ToolContext, ToolResult};

/// Read a file's full contents, refusing files over the character limit
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Read a local file with size limit"
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path_str": {
                    "type": "string",
                    "description": "path of the file to read"
                },
                "max_chars": {
                    "type": "integer",
                    "description": "maximum number of characters to read (default: 4000)"
                }
            },
            "required": ["path_str"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "ReadFileTool::execute: called");
        let path = match input["path_str"].as_str() {
            Some(p) => p,
            None => {
                debug!("ReadFileTool::execute: missing path_str parameter");
                return ToolResult::error("path_str is required");
            }
        };

        let max_chars = arg_u64(&input, "max_chars")
            .map(|n| n as usize)
            .unwrap_or(ctx.limits.read_max_chars);

        let full_path = match ctx.resolve_path(Path::new(path)) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(e.to_string()),
        };

        if !full_path.is_file() {
            debug!(?full_path, "ReadFileTool::execute: not a file");
            return ToolResult::error(format!("File {} not found", path));
        }

        let bytes = match tokio::fs::read(&full_path).await {
            Ok(b) => b,
            Err(e) => return ToolResult::error(format!("Failed to read file {}: {}", path, e)),
        };
        let content = String::from_utf8_lossy(&bytes);

        let chars = content.chars().count();
        if chars > max_chars {
            debug!(chars, max_chars, "ReadFileTool::execute: file too large");
            return ToolResult::error(format!(
                "File {} is too large ({} chars, limit {})",
                path, chars, max_chars
            ));
        }

        ToolResult::success(content.into_owned())
    }
}
