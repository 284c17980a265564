//! Error types for tool execution.

use std::path::PathBuf;
use thiserror::Error;

/// Errors a tool implementation may raise; the registry catches all of these
/// and folds them into a failed [`crate::result::ToolOutcome`].
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("path not allowed: {path}")]
    PathNotAllowed { path: PathBuf },

    #[error("file too large: {size} bytes (max: {max})")]
    FileTooLarge { size: usize, max: usize },

    #[error("file is not valid UTF-8: {path}")]
    NotUtf8 { path: PathBuf },

    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    #[error("command not on the allow-list: {command}")]
    CommandNotAllowed { command: String },

    #[error("command failed with exit code {exit_code}: {message}")]
    CommandFailed { exit_code: i32, message: String },

    #[error("invalid search pattern: {pattern}")]
    InvalidPattern { pattern: String },

    #[error("unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid arguments: {message}")]
    Validation { message: String },
}

/// Result type alias for tool implementations.
pub type ToolResult<T> = std::result::Result<T, ToolError>;
