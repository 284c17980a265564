//! Stripping CLI banner/loading/timing noise from raw subprocess stdout while
//! preserving code blocks and multi-line structure.

const NOISE_PREFIXES: &[&str] = &["loading", "thinking...", "spinner", "connecting to", "initializing"];

/// Clean one CLI backend's raw stdout into response text.
pub fn clean_stdout(raw: &str) -> String {
    let mut kept = Vec::new();
    let mut in_code_block = false;

    for line in raw.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            in_code_block = !in_code_block;
            kept.push(line);
            continue;
        }
        if in_code_block {
            kept.push(line);
            continue;
        }
        if is_noise(trimmed) {
            continue;
        }
        kept.push(line);
    }

    kept.join("\n").trim().to_string()
}

fn is_noise(trimmed: &str) -> bool {
    let lower = trimmed.to_lowercase();
    if NOISE_PREFIXES.iter().any(|prefix| lower.starts_with(prefix)) {
        return true;
    }
    // Timing/metadata lines like "[tokens: 412, 38.2 tok/s]" or "(1.2s)".
    if (trimmed.starts_with('[') && trimmed.ends_with(']') && (lower.contains("tok/s") || lower.contains("tokens")))
        || (trimmed.starts_with('(') && trimmed.ends_with("s)") && trimmed.len() < 16)
    {
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_loading_banner() {
        let raw = "Loading model...\nHere is the answer.";
        assert_eq!(clean_stdout(raw), "Here is the answer.");
    }

    #[test]
    fn strips_timing_metadata() {
        let raw = "The answer is 4.\n[tokens: 120, 30.1 tok/s]";
        assert_eq!(clean_stdout(raw), "The answer is 4.");
    }

    #[test]
    fn preserves_code_blocks_verbatim() {
        let raw = "Here:\n```rust\nfn main() {}\n[not metadata]\n```\nDone.";
        let cleaned = clean_stdout(raw);
        assert!(cleaned.contains("fn main() {}"));
        assert!(cleaned.contains("[not metadata]"));
    }
}
