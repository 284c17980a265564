//! `code-search`: regex search over text files, preferring an external
//! `rg` when available and falling back to an internal walk otherwise.

use crate::context::ToolContext;
use crate::error::{ToolError, ToolResult};
use crate::registry::Tool;
use crate::result::{CodeSearchOutput, SearchMatch};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::process::Stdio;
use tracing::{debug, instrument};
use walkdir::WalkDir;

#[derive(Debug, Deserialize)]
struct CodeSearchArgs {
    pattern: String,
    #[serde(default)]
    path: Option<String>,
}

pub struct CodeSearchTool;

#[async_trait]
impl Tool for CodeSearchTool {
    fn name(&self) -> &'static str {
        "code-search"
    }

    #[instrument(skip(self, ctx, arguments), fields(op_id = %ctx.operation_id))]
    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> ToolResult<Value> {
        let args: CodeSearchArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::Validation { message: e.to_string() })?;

        if args.pattern.is_empty() {
            return Err(ToolError::InvalidPattern { pattern: args.pattern });
        }
        let regex = regex::Regex::new(&args.pattern).map_err(|_| ToolError::InvalidPattern { pattern: args.pattern.clone() })?;

        let search_path = ctx.resolve_path(args.path.as_deref().unwrap_or("."));
        if !ctx.is_path_allowed(&search_path) {
            return Err(ToolError::PathNotAllowed { path: search_path });
        }

        let max_matches = ctx.config.max_search_matches;

        let (matches, engine) = match run_ripgrep(&args.pattern, &search_path, max_matches).await {
            Some(matches) => (matches, "ripgrep"),
            None => {
                debug!("ripgrep unavailable, falling back to internal regex walk");
                (internal_regex_walk(&regex, &search_path, max_matches), "internal")
            }
        };

        let truncated = matches.len() >= max_matches;
        let output = CodeSearchOutput {
            matches,
            pattern: args.pattern,
            truncated,
            engine: engine.to_string(),
        };
        Ok(serde_json::to_value(output).expect("CodeSearchOutput always serializes"))
    }
}

/// Attempt the search via an external `rg` binary. Returns `None` when `rg`
/// isn't on `PATH` or fails to spawn, signaling the caller to fall back.
async fn run_ripgrep(pattern: &str, path: &Path, max_matches: usize) -> Option<Vec<SearchMatch>> {
    let output = tokio::process::Command::new("rg")
        .arg("--line-number")
        .arg("--no-heading")
        .arg(pattern)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .ok()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut matches = Vec::new();

    for line in stdout.lines() {
        if matches.len() >= max_matches {
            break;
        }
        // rg --no-heading output: "path:line_number:content"
        let mut parts = line.splitn(3, ':');
        let (Some(file), Some(line_no), Some(content)) = (parts.next(), parts.next(), parts.next()) else {
            continue;
        };
        let Ok(line_number) = line_no.parse::<usize>() else {
            continue;
        };
        matches.push(SearchMatch {
            path: file.into(),
            line_number,
            line_content: content.to_string(),
        });
    }

    Some(matches)
}

/// Walk text files under `path` line by line, matching `regex` directly.
fn internal_regex_walk(regex: &regex::Regex, path: &Path, max_matches: usize) -> Vec<SearchMatch> {
    let mut matches = Vec::new();

    for entry in WalkDir::new(path).into_iter().filter_map(Result::ok) {
        if matches.len() >= max_matches {
            break;
        }
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(entry.path()) else {
            continue; // binary or unreadable files are skipped, not errors
        };
        for (idx, line) in content.lines().enumerate() {
            if matches.len() >= max_matches {
                break;
            }
            if regex.is_match(line) {
                matches.push(SearchMatch {
                    path: entry.path().to_path_buf(),
                    line_number: idx + 1,
                    line_content: line.to_string(),
                });
            }
        }
    }

    matches
}
