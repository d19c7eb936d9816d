//! Tool error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during tool execution
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool '{name}'. Available tools: {}", .available.join(", "))]
    UnknownTool { name: String, available: Vec<String> },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Failed(String),

    #[error("Tool timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Tool panicked: {0}")]
    Panicked(String),

    #[error("Path {path} escapes working directory {workdir}")]
    SandboxViolation { path: PathBuf, workdir: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
