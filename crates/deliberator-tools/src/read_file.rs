//! `file-read`: read a sandboxed file's contents as UTF-8 text.

use crate::context::ToolContext;
use crate::error::{ToolError, ToolResult};
use crate::registry::Tool;
use crate::result::ReadFileOutput;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

#[derive(Debug, Deserialize)]
struct ReadFileArgs {
    path: String,
}

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &'static str {
        "file-read"
    }

    #[instrument(skip(self, ctx, arguments), fields(op_id = %ctx.operation_id))]
    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> ToolResult<Value> {
        let args: ReadFileArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::Validation { message: e.to_string() })?;

        let resolved = ctx.resolve_path(&args.path);

        if !ctx.is_path_allowed(&resolved) {
            return Err(ToolError::PathNotAllowed { path: resolved });
        }

        let metadata = std::fs::metadata(&resolved).map_err(|_| ToolError::FileNotFound { path: resolved.clone() })?;

        if !metadata.is_file() {
            return Err(ToolError::FileNotFound { path: resolved });
        }

        let size = metadata.len() as usize;
        if size > ctx.config.max_file_size_bytes {
            return Err(ToolError::FileTooLarge {
                size,
                max: ctx.config.max_file_size_bytes,
            });
        }

        let bytes = std::fs::read(&resolved)?;
        let content = String::from_utf8(bytes).map_err(|_| ToolError::NotUtf8 { path: resolved.clone() })?;

        let output = ReadFileOutput {
            content,
            path: resolved,
            size,
        };
        Ok(serde_json::to_value(output).expect("ReadFileOutput always serializes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn reads_small_text_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("hello.txt"), "hello world").unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf(), "op_1");

        let result = ReadFileTool
            .execute(&ctx, serde_json::json!({"path": "hello.txt"}))
            .await
            .unwrap();
        let output: ReadFileOutput = serde_json::from_value(result).unwrap();
        assert_eq!(output.content, "hello world");
    }

    #[tokio::test]
    async fn refuses_file_over_the_size_cap() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("big.txt"), vec![b'x'; 2 * 1024 * 1024]).unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf(), "op_1");

        let result = ReadFileTool.execute(&ctx, serde_json::json!({"path": "big.txt"})).await;
        assert!(matches!(result, Err(ToolError::FileTooLarge { .. })));
    }

    #[tokio::test]
    async fn refuses_non_utf8_content() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("binary.bin"), [0xFF, 0xFE, 0x00, 0xA9]).unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf(), "op_1");

        let result = ReadFileTool.execute(&ctx, serde_json::json!({"path": "binary.bin"})).await;
        assert!(matches!(result, Err(ToolError::NotUtf8 { .. })));
    }

    #[tokio::test]
    async fn refuses_path_outside_sandbox() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf(), "op_1");

        let result = ReadFileTool.execute(&ctx, serde_json::json!({"path": "/etc/passwd"})).await;
        assert!(matches!(result, Err(ToolError::PathNotAllowed { .. })));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf(), "op_1");

        let result = ReadFileTool.execute(&ctx, serde_json::json!({"path": "nope.txt"})).await;
        assert!(matches!(result, Err(ToolError::FileNotFound { .. })));
    }
}
