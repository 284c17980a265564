//! Wires the tool-call subprotocol (§4.2) into a round: parses
//! `TOOL_REQUEST:` markers out of a participant's response and dispatches
//! each sequentially against the sandboxed registry. Results are advisory —
//! they are not retroactively fed back into the round that produced them
//! (§4.8 step 4).

use deliberator_log::spans::tool_execution_span;
use deliberator_tools::{extract_tool_requests, ToolOutcome, ToolRegistry};
use std::path::Path;
use tracing::Instrument;

/// Execute every tool request embedded in `response_text`, in order, within
/// `working_dir`.
pub async fn run_requested_tools(
    registry: &ToolRegistry,
    response_text: &str,
    working_dir: &Path,
    operation_id: &str,
) -> Vec<ToolOutcome> {
    let requests = extract_tool_requests(response_text);
    let ctx = deliberator_tools::ToolContext::new(working_dir.to_path_buf(), operation_id);

    let mut outcomes = Vec::with_capacity(requests.len());
    for request in requests {
        let span = tool_execution_span(&request.name, operation_id);
        let outcome = registry
            .dispatch(&request.name, &ctx, request.arguments)
            .instrument(span)
            .await;
        outcomes.push(outcome);
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn runs_an_embedded_file_read_request() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.md"), "hello").unwrap();

        let response = "Let me check.\nTOOL_REQUEST: {\"name\": \"file-read\", \"arguments\": {\"path\": \"notes.md\"}}";
        let registry = ToolRegistry::with_defaults();
        let outcomes = run_requested_tools(&registry, response, dir.path(), "op_1").await;

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].success);
    }

    #[tokio::test]
    async fn response_without_markers_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ToolRegistry::with_defaults();
        let outcomes = run_requested_tools(&registry, "just text", dir.path(), "op_1").await;
        assert!(outcomes.is_empty());
    }
}
