//! shell tool - execute a shell command with a timeout

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use super::arg_f64;
use crate::tools::{Tool, ToolContext, ToolResult};

const MAX_OUTPUT_CHARS: usize = 30_000;

/// Execute a shell command via `sh -c`
pub struct ShellTool;

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &'static str {
        "shell"
    }

    fn description(&self) -> &'static str {
        "Execute shell command with timeout"
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "shell command to execute"
                },
                "timeout": {
                    "type": "number",
                    "description": "timeout in seconds (default: 30.0)"
                },
                "cwd": {
                    "type": "string",
                    "description": "working directory for command execution"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "ShellTool::execute: called");
        let command = match input["command"].as_str() {
            Some(c) => c,
            None => {
                debug!("ShellTool::execute: missing command parameter");
                return ToolResult::error("command is required");
            }
        };

        let timeout = arg_f64(&input, "timeout")
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .filter(|d| !d.is_zero())
            .unwrap_or(ctx.limits.shell_timeout);

        let cwd = match input["cwd"].as_str() {
            Some(dir) => match ctx.resolve_path(Path::new(dir)) {
                Ok(p) => p,
                Err(e) => return ToolResult::error(e.to_string()),
            },
            None => ctx.workdir.clone(),
        };

        debug!(%command, ?cwd, ?timeout, "ShellTool::execute: spawning command");
        let output = match tokio::time::timeout(
            timeout,
            tokio::process::Command::new("sh")
                .arg("-c")
                .arg(command)
                .current_dir(&cwd)
                .kill_on_drop(true)
                .output(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                debug!(%e, "ShellTool::execute: failed to execute command");
                return ToolResult::error(format!("Shell execution error: {}", e));
            }
            Err(_) => {
                debug!("ShellTool::execute: command timed out");
                return ToolResult::error(format!("Command timeout after {}s", timeout.as_secs_f64()));
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        let text = if combined.is_empty() {
            "Command executed successfully with no output".to_string()
        } else if combined.chars().count() > MAX_OUTPUT_CHARS {
            let total = combined.chars().count();
            let head: String = combined.chars().take(MAX_OUTPUT_CHARS).collect();
            format!("{}...\n[truncated, {} chars total]", head, total)
        } else {
            combined
        };

        if output.status.success() {
            ToolResult::success(text)
        } else {
            debug!(exit_code = ?output.status.code(), "ShellTool::execute: command failed");
            ToolResult::error(format!("Exit code: {}\n{}", output.status.code().unwrap_or(-1), text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_shell_basic() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "test");

        let result = ShellTool.execute(serde_json::json!({"command": "echo hello"}), &ctx).await;

        assert!(!result.is_error);
        assert_eq!(result.content.trim(), "hello");
    }

    #[tokio::test]
    async fn test_shell_combines_stderr() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "test");

        let result = ShellTool
            .execute(serde_json::json!({"command": "echo out; echo err >&2"}), &ctx)
            .await;

        assert!(!result.is_error);
        assert!(result.content.contains("out"));
        assert!(result.content.contains("err"));
    }

    #[tokio::test]
    async fn test_shell_out_of_range_timeout_uses_default() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "test");

        for timeout in [serde_json::json!(1e30), serde_json::json!(-5), serde_json::json!("inf")] {
            let result = ShellTool
                .execute(serde_json::json!({"command": "echo ok", "timeout": timeout}), &ctx)
                .await;
            assert!(!result.is_error, "{}", result.content);
            assert_eq!(result.content.trim(), "ok");
        }
    }

    #[tokio::test]
    async fn test_shell_no_output() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "test");

        let result = ShellTool.execute(serde_json::json!({"command": "true"}), &ctx).await;
        assert!(!result.is_error);
        assert!(result.content.contains("no output"));
    }

    #[tokio::test]
    async fn test_shell_failure_exit_code() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "test");

        let result = ShellTool.execute(serde_json::json!({"command": "exit 3"}), &ctx).await;
        assert!(result.is_error);
        assert!(result.content.contains("Exit code: 3"));
    }

    #[tokio::test]
    async fn test_shell_timeout() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "test");

        let result = ShellTool
            .execute(serde_json::json!({"command": "sleep 5", "timeout": "0.1"}), &ctx)
            .await;

        assert!(result.is_error);
        assert!(result.content.contains("timeout"));
    }

    #[tokio::test]
    async fn test_shell_cwd() {
        let temp = tempdir().unwrap();
        std::fs::create_dir(temp.path().join("sub")).unwrap();
        std::fs::write(temp.path().join("sub/marker"), "").unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "test");

        let result = ShellTool
            .execute(serde_json::json!({"command": "ls", "cwd": "sub"}), &ctx)
            .await;

        assert!(!result.is_error);
        assert!(result.content.contains("marker"));
    }
}
