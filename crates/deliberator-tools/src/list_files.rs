//! `file-list`: glob-match entries under a sandboxed directory.

use crate::context::ToolContext;
use crate::error::{ToolError, ToolResult};
use crate::registry::Tool;
use crate::result::{FileEntry, ListFilesOutput};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

#[derive(Debug, Deserialize)]
struct ListFilesArgs {
    pattern: String,
    #[serde(default)]
    path: Option<String>,
}

pub struct ListFilesTool;

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &'static str {
        "file-list"
    }

    #[instrument(skip(self, ctx, arguments), fields(op_id = %ctx.operation_id))]
    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> ToolResult<Value> {
        let args: ListFilesArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::Validation { message: e.to_string() })?;

        let base = ctx.resolve_path(args.path.as_deref().unwrap_or("."));
        if !ctx.is_path_allowed(&base) {
            return Err(ToolError::PathNotAllowed { path: base });
        }

        let full_pattern = base.join(&args.pattern);
        let pattern_str = full_pattern.to_string_lossy().into_owned();

        let paths = glob::glob(&pattern_str).map_err(|_| ToolError::InvalidPattern { pattern: args.pattern.clone() })?;

        let max_entries = ctx.config.max_list_entries;
        let mut entries = Vec::new();

        for entry in paths {
            if entries.len() >= max_entries {
                break;
            }
            let Ok(path) = entry else { continue };
            let metadata = std::fs::metadata(&path).ok();
            entries.push(FileEntry {
                is_dir: metadata.as_ref().map(|m| m.is_dir()).unwrap_or(false),
                size: metadata.as_ref().filter(|m| m.is_file()).map(|m| m.len()),
                path,
            });
        }

        let truncated = entries.len() >= max_entries;
        let output = ListFilesOutput { entries, truncated };
        Ok(serde_json::to_value(output).expect("ListFilesOutput always serializes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn lists_matching_entries() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.rs"), "").unwrap();
        fs::write(dir.path().join("b.rs"), "").unwrap();
        fs::write(dir.path().join("c.txt"), "").unwrap();

        let ctx = ToolContext::new(dir.path().to_path_buf(), "op_1");
        let result = ListFilesTool.execute(&ctx, serde_json::json!({"pattern": "*.rs"})).await.unwrap();
        let output: ListFilesOutput = serde_json::from_value(result).unwrap();
        assert_eq!(output.entries.len(), 2);
        assert!(!output.truncated);
    }

    #[tokio::test]
    async fn refuses_path_outside_sandbox() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf(), "op_1");
        let result = ListFilesTool
            .execute(&ctx, serde_json::json!({"pattern": "*", "path": "/etc"}))
            .await;
        assert!(matches!(result, Err(ToolError::PathNotAllowed { .. })));
    }
}
