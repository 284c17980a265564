//! Secondary backend call that produces the final consensus / agreements /
//! disagreements / recommendation (§4.8 "Generate Summary"). Failure here
//! never fails the deliberation: a placeholder summary is produced instead
//! (§7 SummarizerError).

use deliberator_backends::{BackendRegistry, Invoke, InvokeRequest};
use deliberator_core::{RoundResponse, Summary, VotingResult};
use serde::Deserialize;
use serde_json::Deserializer;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct RawSummary {
    consensus: String,
    #[serde(default)]
    key_agreements: Vec<String>,
    #[serde(default)]
    key_disagreements: Vec<String>,
    final_recommendation: String,
}

impl From<RawSummary> for Summary {
    fn from(raw: RawSummary) -> Self {
        Summary {
            consensus: raw.consensus,
            key_agreements: raw.key_agreements,
            key_disagreements: raw.key_disagreements,
            final_recommendation: raw.final_recommendation,
        }
    }
}

fn summarizer_prompt(question: &str, responses: &[RoundResponse], voting: Option<&VotingResult>) -> String {
    let mut transcript = String::new();
    for r in responses {
        transcript.push_str(&format!("Round {} — {}: {}\n\n", r.round, r.participant, r.text));
    }

    let voting_note = match voting {
        Some(v) if v.consensus_reached => format!(
            "\nA vote was taken; the winning option was \"{}\".",
            v.winning_option.as_deref().unwrap_or("")
        ),
        Some(_) => "\nA vote was taken but ended in a tie with no winning option.".to_string(),
        None => String::new(),
    };

    format!(
        "You are summarizing a multi-participant deliberation.\n\nQuestion: {question}\n\nFull debate:\n{transcript}{voting_note}\n\n\
        Respond with a single JSON object, and nothing else, of the exact shape:\n\
        {{\"consensus\": \"...\", \"key_agreements\": [\"...\"], \"key_disagreements\": [\"...\"], \"final_recommendation\": \"...\"}}"
    )
}

fn parse_summary_response(text: &str) -> Option<Summary> {
    let brace_idx = text.find('{')?;
    let mut stream = Deserializer::from_str(&text[brace_idx..]).into_iter::<serde_json::Value>();
    let value = stream.next()?.ok()?;
    serde_json::from_value::<RawSummary>(value).ok().map(Summary::from)
}

/// A placeholder summary assembled without any backend call, used when
/// every summarizer attempt fails.
pub fn placeholder_summary(responses: &[RoundResponse], voting: Option<&VotingResult>) -> Summary {
    let consensus = match voting {
        Some(v) if v.consensus_reached => format!(
            "Participants voted; \"{}\" received the most votes.",
            v.winning_option.as_deref().unwrap_or("")
        ),
        _ => "No automated summary could be generated; see the full debate transcript.".to_string(),
    };

    Summary {
        consensus,
        key_agreements: Vec::new(),
        key_disagreements: Vec::new(),
        final_recommendation: responses
            .last()
            .map(|r| r.text.clone())
            .unwrap_or_default(),
    }
}

/// Try each `(backend_id, model_id)` pair in order until one produces a
/// parseable summary; fall back to a placeholder otherwise.
pub async fn summarize(
    registry: &BackendRegistry,
    preference_order: &[(String, String)],
    question: &str,
    responses: &[RoundResponse],
    voting: Option<&VotingResult>,
) -> Summary {
    let prompt = summarizer_prompt(question, responses, voting);

    for (backend_id, model_id) in preference_order {
        let Some(adapter) = registry.get(backend_id) else {
            continue;
        };
        let request = InvokeRequest::new(prompt.clone(), model_id.clone());
        match adapter.invoke(&request).await {
            Ok(text) => match parse_summary_response(&text) {
                Some(summary) => return summary,
                None => warn!(backend_id, "summarizer backend returned unparseable output"),
            },
            Err(e) => warn!(backend_id, error = %e, "summarizer backend call failed"),
        }
    }

    placeholder_summary(responses, voting)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_summary() {
        let text = "{\"consensus\": \"We agree\", \"key_agreements\": [\"a\"], \"key_disagreements\": [], \"final_recommendation\": \"ship it\"}";
        let summary = parse_summary_response(text).unwrap();
        assert_eq!(summary.consensus, "We agree");
        assert_eq!(summary.final_recommendation, "ship it");
    }

    #[test]
    fn tolerates_leading_prose_before_the_json_object() {
        let text = "Here is my summary:\n{\"consensus\": \"ok\", \"final_recommendation\": \"go\"}";
        let summary = parse_summary_response(text).unwrap();
        assert_eq!(summary.consensus, "ok");
        assert!(summary.key_agreements.is_empty());
    }

    #[test]
    fn garbage_output_fails_to_parse() {
        assert!(parse_summary_response("not json at all").is_none());
    }

    #[test]
    fn placeholder_reflects_vote_outcome_when_present() {
        let voting = VotingResult {
            final_tally: std::collections::HashMap::new(),
            votes_by_round: Vec::new(),
            consensus_reached: true,
            winning_option: Some("A".to_string()),
        };
        let summary = placeholder_summary(&[], Some(&voting));
        assert!(summary.consensus.contains('A'));
    }
}
