//! The tool executor: parses `TOOL_REQUEST:` markers out of participant
//! response text and dispatches them against a sandboxed, read-only set of
//! built-in tools (file-read, code-search, file-list, run-command).

pub mod code_search;
pub mod context;
pub mod error;
pub mod list_files;
pub mod parser;
pub mod read_file;
pub mod registry;
pub mod result;
pub mod run_command;

pub use context::{ToolConfig, ToolContext};
pub use error::{ToolError, ToolResult};
pub use parser::{extract_tool_requests, ToolRequest};
pub use registry::{Tool, ToolRegistry};
pub use result::ToolOutcome;

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn parses_and_dispatches_a_tool_request_end_to_end() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes.md"), "line one\nline two").unwrap();

        let response = format!(
            "Let me check that file.\nTOOL_REQUEST: {{\"name\": \"file-read\", \"arguments\": {{\"path\": \"notes.md\"}}}}\n"
        );
        let requests = extract_tool_requests(&response);
        assert_eq!(requests.len(), 1);

        let registry = ToolRegistry::with_defaults();
        let ctx = ToolContext::new(dir.path().to_path_buf(), "op_1");
        let outcome = registry.dispatch(&requests[0].name, &ctx, requests[0].arguments.clone()).await;

        assert!(outcome.success);
        assert_eq!(outcome.tool_name, "file-read");
    }
}
