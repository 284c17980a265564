//! Extracts `TOOL_REQUEST: {json}` markers from participant response text.
//!
//! A naive brace-counting scan misreads braces that appear inside JSON
//! string values (e.g. a `code-search` pattern containing `{`); this uses
//! `serde_json`'s own streaming deserializer to find where the object
//! actually ends.

use serde::{Deserialize, Serialize};
use serde_json::Deserializer;

pub const MARKER: &str = "TOOL_REQUEST:";

/// One parsed tool invocation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// Scan `text` line by line for `TOOL_REQUEST:` markers and decode the JSON
/// object that follows each one. Lines with invalid JSON, or JSON that
/// doesn't decode into `{name, arguments}`, are silently skipped.
pub fn extract_tool_requests(text: &str) -> Vec<ToolRequest> {
    let mut requests = Vec::new();

    for line in text.lines() {
        let Some(marker_idx) = line.find(MARKER) else {
            continue;
        };
        let after_marker = &line[marker_idx + MARKER.len()..];
        let Some(brace_idx) = after_marker.find('{') else {
            continue;
        };
        let json_start = &after_marker[brace_idx..];

        let mut stream = Deserializer::from_str(json_start).into_iter::<serde_json::Value>();
        let Some(Ok(value)) = stream.next() else {
            continue;
        };

        if let Ok(request) = serde_json::from_value::<ToolRequest>(value) {
            if !request.name.trim().is_empty() {
                requests.push(request);
            }
        }
    }

    requests
}
