//! write_file tool - write content to a file with optional backup

use async_trait::async_trait;
use serde_json::Value;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::arg_bool;
use crate::tools::{Tool, ToolContext, ToolResult};

/// Write content to a file, backing up what was there first
pub struct WriteFileTool;

/// `notes.txt` -> `notes.txt.bak`
fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".bak");
    path.with_file_name(name)
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &'static str {
        "write_file"
    }

    fn description(&self) -> &'static str {
        "Write content to a file (creates or overwrites) with optional backup"
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path_str": {
                    "type": "string",
                    "description": "path of the file to write"
                },
                "content": {
                    "type": "string",
                    "description": "content to write to the file"
                },
                "backup": {
                    "type": "boolean",
                    "description": "whether to backup existing file (default: true)"
                }
            },
            "required": ["path_str", "content"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!("WriteFileTool::execute: called");
        let path = match input["path_str"].as_str() {
            Some(p) => p,
            None => {
                debug!("WriteFileTool::execute: missing path_str parameter");
                return ToolResult::error("path_str is required");
            }
        };

        let content = match input["content"].as_str() {
            Some(c) => {
                debug!(content_len = %c.len(), "WriteFileTool::execute: content parameter found");
                c
            }
            None => return ToolResult::error("content is required"),
        };

        let backup = arg_bool(&input, "backup").unwrap_or(true);

        let full_path = match ctx.resolve_path(Path::new(path)) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(e.to_string()),
        };

        if backup && full_path.is_file() {
            let bak = backup_path(&full_path);
            debug!(?bak, "WriteFileTool::execute: backing up existing file");
            if let Err(e) = tokio::fs::copy(&full_path, &bak).await {
                return ToolResult::error(format!("Failed to back up {}: {}", path, e));
            }
        }

        if let Some(parent) = full_path.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            debug!(%e, "WriteFileTool::execute: failed to create parent directories");
            return ToolResult::error(format!("Failed to create directories: {}", e));
        }

        match tokio::fs::write(&full_path, content).await {
            Ok(()) => {
                debug!(?full_path, "WriteFileTool::execute: file written");
                ToolResult::success(format!("File written successfully to {}", path))
            }
            Err(e) => ToolResult::error(format!("Error writing file {}: {}", path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_write_creates_parents() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "test");

        let result = WriteFileTool
            .execute(
                serde_json::json!({"path_str": "deep/nested/out.txt", "content": "hello"}),
                &ctx,
            )
            .await;

        assert!(!result.is_error, "{}", result.content);
        assert_eq!(fs::read_to_string(temp.path().join("deep/nested/out.txt")).unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_write_backs_up_existing() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("notes.txt"), "old").unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "test");

        let result = WriteFileTool
            .execute(serde_json::json!({"path_str": "notes.txt", "content": "new"}), &ctx)
            .await;

        assert!(!result.is_error);
        assert_eq!(fs::read_to_string(temp.path().join("notes.txt")).unwrap(), "new");
        assert_eq!(fs::read_to_string(temp.path().join("notes.txt.bak")).unwrap(), "old");
    }

    #[tokio::test]
    async fn test_write_without_backup() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("notes.txt"), "old").unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf(), "test");

        let result = WriteFileTool
            .execute(
                serde_json::json!({"path_str": "notes.txt", "content": "new", "backup": false}),
                &ctx,
            )
            .await;

        assert!(!result.is_error);
        assert!(!temp.path().join("notes.txt.bak").exists());
    }

    #[tokio::test]
    async fn test_write_sandbox_violation() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new_sandboxed(temp.path().to_path_buf(), "test");

        let result = WriteFileTool
            .execute(serde_json::json!({"path_str": "/tmp/../etc/x", "content": "x"}), &ctx)
            .await;

        assert!(result.is_error);
    }

    #[tokio::test]
    async fn test_write_cannot_climb_out_through_missing_dir() {
        let outer = tempdir().unwrap();
        let inner = outer.path().join("inner");
        fs::create_dir(&inner).unwrap();
        let ctx = ToolContext::new_sandboxed(inner.clone(), "test");

        let result = WriteFileTool
            .execute(
                serde_json::json!({"path_str": "ghost/../../escaped.txt", "content": "x"}),
                &ctx,
            )
            .await;

        assert!(result.is_error);
        assert!(result.content.contains("escapes"), "{}", result.content);
        assert!(!outer.path().join("escaped.txt").exists());
        assert!(!inner.join("ghost").exists());
    }

    #[test]
    fn test_backup_path() {
        assert_eq!(backup_path(Path::new("/a/b.rs")), PathBuf::from("/a/b.rs.bak"));
        assert_eq!(backup_path(Path::new("Makefile")), PathBuf::from("Makefile.bak"));
    }
}
