//! Execution context for the tool executor.

use std::path::PathBuf;
use std::time::Duration;

/// Fixed allow-list of read-only utilities `run-command` may invoke.
pub const DEFAULT_ALLOWED_COMMANDS: &[&str] = &["ls", "cat", "wc", "head", "tail", "grep", "find", "pwd", "echo", "git"];

/// Tuning for tool execution; every field has a spec-mandated default.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    /// `file-read` refuses files larger than this (default 1 MiB).
    pub max_file_size_bytes: usize,
    /// `code-search` caps results at this many matches (default 100).
    pub max_search_matches: usize,
    /// `file-list` caps results at this many entries (default 200).
    pub max_list_entries: usize,
    /// `run-command` hard timeout (default 10s).
    pub command_timeout: Duration,
    /// `run-command` allow-list of executable names.
    pub allowed_commands: Vec<String>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 1024 * 1024,
            max_search_matches: 100,
            max_list_entries: 200,
            command_timeout: Duration::from_secs(10),
            allowed_commands: DEFAULT_ALLOWED_COMMANDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Execution context passed to every tool. `working_dir` sandboxes path
/// resolution: tools must refuse to operate outside of it.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub working_dir: PathBuf,
    pub config: ToolConfig,
    pub operation_id: String,
}

impl ToolContext {
    /// Create a new context with default tuning.
    pub fn new(working_dir: PathBuf, operation_id: impl Into<String>) -> Self {
        Self {
            working_dir,
            config: ToolConfig::default(),
            operation_id: operation_id.into(),
        }
    }

    /// Create with custom tuning.
    pub fn with_config(working_dir: PathBuf, config: ToolConfig, operation_id: impl Into<String>) -> Self {
        Self {
            working_dir,
            config,
            operation_id: operation_id.into(),
        }
    }

    /// Resolve a path relative to the working directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = PathBuf::from(path);
        if path.is_absolute() {
            path
        } else {
            self.working_dir.join(path)
        }
    }

    /// Whether a resolved path stays within the sandboxed working directory.
    pub fn is_path_allowed(&self, path: &std::path::Path) -> bool {
        let canonical_working_dir = self.working_dir.canonicalize().unwrap_or_else(|_| self.working_dir.clone());
        match path.canonicalize() {
            Ok(canonical) => canonical.starts_with(&canonical_working_dir),
            // A path that doesn't exist yet still must resolve (lexically) inside the sandbox.
            Err(_) => path.starts_with(&self.working_dir),
        }
    }

    /// Whether `command` is on the `run-command` allow-list.
    pub fn is_command_allowed(&self, command: &str) -> bool {
        self.config.allowed_commands.iter().any(|c| c == command)
    }
}
