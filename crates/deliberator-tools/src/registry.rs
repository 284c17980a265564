//! Tool trait, dispatch registry, and the four built-in tools.

use crate::context::ToolContext;
use crate::error::ToolResult;
use crate::result::ToolOutcome;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex as AsyncMutex;
use tracing::warn;

/// One registered, read-only tool.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> ToolResult<Value>;
}

struct CwdRestoreGuard(Option<PathBuf>);

impl Drop for CwdRestoreGuard {
    fn drop(&mut self) {
        if let Some(p) = self.0.take() {
            let _ = std::env::set_current_dir(p);
        }
    }
}

/// Dispatches tool calls by name, switching the process working directory
/// around each call and restoring it on every exit path. Working-directory
/// switches across concurrent calls are serialized by `cwd_lock` since the
/// process CWD is a single global.
pub struct ToolRegistry {
    tools: HashMap<&'static str, Box<dyn Tool>>,
    cwd_lock: AsyncMutex<()>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            cwd_lock: AsyncMutex::new(()),
        }
    }

    /// Registry with the four spec tools: file-read, code-search, file-list, run-command.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(crate::read_file::ReadFileTool));
        registry.register(Box::new(crate::code_search::CodeSearchTool));
        registry.register(Box::new(crate::list_files::ListFilesTool));
        registry.register(Box::new(crate::run_command::RunCommandTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name(), tool);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.keys().copied().collect()
    }

    /// Execute a tool by name, producing a [`ToolOutcome`] regardless of
    /// whether the tool is known, its arguments are valid, or it errors.
    pub async fn dispatch(&self, name: &str, ctx: &ToolContext, arguments: Value) -> ToolOutcome {
        let Some(tool) = self.tools.get(name) else {
            return ToolOutcome::failure(name, "unknown tool");
        };

        let _cwd_lock = self.cwd_lock.lock().await;
        let original_cwd = std::env::current_dir().ok();

        if std::env::set_current_dir(&ctx.working_dir).is_err() {
            warn!(working_dir = %ctx.working_dir.display(), "failed to switch working directory for tool call");
            return ToolOutcome::failure(name, "failed to switch working directory");
        }
        let _restore = CwdRestoreGuard(original_cwd);

        match tool.execute(ctx, arguments).await {
            Ok(output) => ToolOutcome::success(name, output),
            Err(e) => ToolOutcome::failure(name, e),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_tool_name_produces_failed_outcome() {
        let registry = ToolRegistry::with_defaults();
        let ctx = ToolContext::new(std::env::temp_dir(), "op_1");
        let outcome = registry.dispatch("does-not-exist", &ctx, Value::Null).await;
        assert!(!outcome.success);
        assert_eq!(outcome.tool_name, "does-not-exist");
    }

    #[test]
    fn default_registry_has_all_four_tools() {
        let registry = ToolRegistry::with_defaults();
        let mut names = registry.names();
        names.sort_unstable();
        assert_eq!(names, vec!["code-search", "file-list", "file-read", "run-command"]);
    }
}
