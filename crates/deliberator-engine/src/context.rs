//! Prompt assembly: the voting-instructions appendix and the running
//! per-round transcript every participant sees (§4.7, §4.8 step 1-2).

use deliberator_core::{RoundResponse, Stance};

/// Appended to every question before it's sent to a participant, specifying
/// the exact `VOTE:` marker format (§4.7).
pub const VOTING_INSTRUCTIONS: &str = "\n\n---\nIf you wish to cast a vote on this question, include a single line of the \
exact form:\n\nVOTE: {\"option\": \"<short option label>\", \"confidence\": <0.0-1.0>, \"rationale\": \"<why>\", \"continue_debate\": <true|false>}\n\n\
Set \"continue_debate\" to false once you believe further rounds would not change your position.\n\
A vote is optional; omit it if you have nothing to add.";

/// Build the prompt sent to each participant this round: the question plus
/// the voting-instructions appendix.
pub fn build_prompt(question: &str) -> String {
    format!("{question}{VOTING_INSTRUCTIONS}")
}

fn stance_label(stance: Stance) -> &'static str {
    match stance {
        Stance::Neutral => "neutral",
        Stance::For => "for",
        Stance::Against => "against",
    }
}

fn format_round_line(response: &RoundResponse) -> String {
    format!(
        "Round {} — {} ({}): {}",
        response.round,
        response.participant,
        stance_label(response.stance),
        response.text
    )
}

/// Concatenate every accumulated response into the running context a
/// participant reads before producing its own. `graph_context`, when
/// present, is prepended (round 1 only, per §4.8 step 1).
pub fn build_context(responses: &[RoundResponse], graph_context: Option<&str>) -> String {
    let mut sections = Vec::new();
    if let Some(graph) = graph_context {
        if !graph.is_empty() {
            sections.push(graph.to_string());
        }
    }
    sections.extend(responses.iter().map(format_round_line));
    sections.join("\n\n")
}
