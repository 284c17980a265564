//! Result types produced by tool execution.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// The uniform envelope every tool dispatch produces, regardless of which
/// tool ran or whether it succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub tool_name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutcome {
    pub fn success(tool_name: impl Into<String>, output: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: true,
            output: Some(output),
            error: None,
        }
    }

    pub fn failure(tool_name: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: false,
            output: None,
            error: Some(error.to_string()),
        }
    }
}

/// Result of a `file-read` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadFileOutput {
    pub content: String,
    pub path: PathBuf,
    pub size: usize,
}

/// A single `code-search` match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchMatch {
    pub path: PathBuf,
    pub line_number: usize,
    pub line_content: String,
}

/// Result of a `code-search` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSearchOutput {
    pub matches: Vec<SearchMatch>,
    pub pattern: String,
    pub truncated: bool,
    /// Which backend produced the matches: `ripgrep` or `internal`.
    pub engine: String,
}

/// One entry in a `file-list` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: PathBuf,
    pub is_dir: bool,
    pub size: Option<u64>,
}

/// Result of a `file-list` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListFilesOutput {
    pub entries: Vec<FileEntry>,
    pub truncated: bool,
}

/// Result of a `run-command` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}
