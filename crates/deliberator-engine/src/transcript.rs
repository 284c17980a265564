//! Renders a completed deliberation as a markdown transcript and writes it
//! to the configured transcripts directory (§4.10). Write failure is
//! non-fatal: the caller gets an empty `transcript_path` and the result is
//! still returned.

use chrono::{DateTime, Utc};
use deliberator_core::{
    ConvergenceInfo, DeliberationStatus, Mode, RoundResponse, Summary, VotingResult,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

fn slugify(question: &str) -> String {
    let mut slug = String::new();
    let mut last_was_dash = false;
    for ch in question.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
            last_was_dash = false;
        } else if !last_was_dash {
            slug.push('-');
            last_was_dash = true;
        }
    }
    let trimmed = slug.trim_matches('-');
    trimmed.chars().take(60).collect()
}

fn filename(timestamp: DateTime<Utc>, question: &str) -> String {
    format!("{}_{}.md", timestamp.format("%Y%m%d_%H%M%S"), slugify(question))
}

fn mode_label(mode: Mode) -> &'static str {
    match mode {
        Mode::Quick => "quick",
        Mode::Conference => "conference",
    }
}

fn status_label(status: DeliberationStatus) -> &'static str {
    match status {
        DeliberationStatus::Complete => "complete",
        DeliberationStatus::Partial => "partial",
        DeliberationStatus::Failed => "failed",
    }
}

/// Render a completed deliberation as markdown.
#[allow(clippy::too_many_arguments)]
pub fn render_markdown(
    question: &str,
    mode: Mode,
    rounds_completed: u32,
    status: DeliberationStatus,
    participants: &[String],
    full_debate: &[RoundResponse],
    voting_result: Option<&VotingResult>,
    convergence_info: Option<&ConvergenceInfo>,
    summary: &Summary,
) -> String {
    let mut doc = String::new();

    doc.push_str(&format!("# {question}\n\n"));
    doc.push_str("## Metadata\n\n");
    doc.push_str(&format!("- **Mode:** {}\n", mode_label(mode)));
    doc.push_str(&format!("- **Rounds completed:** {rounds_completed}\n"));
    doc.push_str(&format!("- **Participants:** {}\n", participants.join(", ")));
    doc.push_str(&format!("- **Status:** {}\n\n", status_label(status)));

    let max_round = full_debate.iter().map(|r| r.round).max().unwrap_or(0);
    for round in 1..=max_round {
        doc.push_str(&format!("## Round {round}\n\n"));
        for response in full_debate.iter().filter(|r| r.round == round) {
            doc.push_str(&format!(
                "### {} ({:?})\n\n{}\n\n",
                response.participant, response.stance, response.text
            ));
        }
    }

    if let Some(voting) = voting_result {
        doc.push_str("## Voting Result\n\n");
        doc.push_str("| Option | Votes |\n|---|---|\n");
        let sorted: BTreeMap<&String, &u32> = voting.final_tally.iter().collect();
        for (option, count) in sorted {
            doc.push_str(&format!("| {option} | {count} |\n"));
        }
        doc.push('\n');
        doc.push_str(&format!(
            "**Winning option:** {}\n\n",
            voting.winning_option.as_deref().unwrap_or("none (no consensus)")
        ));
    }

    if let Some(convergence) = convergence_info {
        doc.push_str("## Convergence\n\n");
        doc.push_str(&format!("- **Status:** {:?}\n", convergence.status));
        doc.push_str(&format!("- **Final similarity:** {:.3}\n\n", convergence.final_similarity));
    }

    doc.push_str("## Summary\n\n");
    doc.push_str(&format!("**Consensus:** {}\n\n", summary.consensus));
    if !summary.key_agreements.is_empty() {
        doc.push_str("**Key agreements:**\n\n");
        for item in &summary.key_agreements {
            doc.push_str(&format!("- {item}\n"));
        }
        doc.push('\n');
    }
    if !summary.key_disagreements.is_empty() {
        doc.push_str("**Key disagreements:**\n\n");
        for item in &summary.key_disagreements {
            doc.push_str(&format!("- {item}\n"));
        }
        doc.push('\n');
    }
    doc.push_str(&format!("**Final recommendation:** {}\n", summary.final_recommendation));

    doc
}

/// Write `markdown` under `dir` with the spec'd filename, returning the
/// absolute path on success. Any failure is logged and yields `None`; the
/// caller treats that as non-fatal (§4.10).
pub fn write_transcript(dir: &Path, question: &str, timestamp: DateTime<Utc>, markdown: &str) -> Option<PathBuf> {
    if let Err(e) = std::fs::create_dir_all(dir) {
        warn!(error = %e, dir = %dir.display(), "failed to create transcripts directory");
        return None;
    }

    let path = dir.join(filename(timestamp, question));
    if let Err(e) = std::fs::write(&path, markdown) {
        warn!(error = %e, path = %path.display(), "failed to write transcript");
        return None;
    }

    match path.canonicalize() {
        Ok(absolute) => Some(absolute),
        Err(_) => Some(path),
    }
}
