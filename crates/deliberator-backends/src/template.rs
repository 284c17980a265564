//! Placeholder substitution for CLI argument templates.

use crate::invoke::InvokeRequest;

/// Substitute `{model}`, `{prompt}`, `{working_directory}`, `{reasoning_effort}`
/// into each templated argument.
pub fn render_args(template: &[String], request: &InvokeRequest) -> Vec<String> {
    template.iter().map(|arg| substitute(arg, request)).collect()
}

fn substitute(arg: &str, request: &InvokeRequest) -> String {
    let working_directory = request
        .working_directory
        .as_deref()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    let reasoning_effort = request.reasoning_effort.as_deref().unwrap_or("");

    arg.replace("{model}", &request.model)
        .replace("{prompt}", &request.full_prompt())
        .replace("{working_directory}", &working_directory)
        .replace("{reasoning_effort}", reasoning_effort)
}
