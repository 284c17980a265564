//! `run-command`: execute an allow-listed read-only utility under a hard
//! 10-second timeout. Unlike the backend adapter's CLI subprocess path, this
//! is a single fixed deadline, not an activity-based timeout — run-command
//! invocations are short, read-only utility calls, not long model turns.

use crate::context::ToolContext;
use crate::error::{ToolError, ToolResult};
use crate::registry::Tool;
use crate::result::RunCommandOutput;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::instrument;

#[derive(Debug, Deserialize)]
struct RunCommandArgs {
    command: String,
    #[serde(default)]
    args: Vec<String>,
}

pub struct RunCommandTool;

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &'static str {
        "run-command"
    }

    #[instrument(skip(self, ctx, arguments), fields(op_id = %ctx.operation_id))]
    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> ToolResult<Value> {
        let args: RunCommandArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::Validation { message: e.to_string() })?;

        if !ctx.is_command_allowed(&args.command) {
            return Err(ToolError::CommandNotAllowed { command: args.command });
        }

        let mut cmd = Command::new(&args.command);
        cmd.args(&args.args)
            .current_dir(&ctx.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn()?;

        let output = timeout(ctx.config.command_timeout, child.wait_with_output())
            .await
            .map_err(|_| ToolError::Timeout { duration: ctx.config.command_timeout })??;

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if exit_code != 0 {
            return Err(ToolError::CommandFailed {
                exit_code,
                message: stderr,
            });
        }

        let result = RunCommandOutput { exit_code, stdout, stderr };
        Ok(serde_json::to_value(result).expect("RunCommandOutput always serializes"))
    }
}
