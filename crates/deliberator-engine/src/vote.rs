//! The `VOTE:` marker subprotocol: extraction per §4.7 and aggregation
//! across all rounds of a deliberation.

use deliberator_core::Vote;
use serde_json::Deserializer;
use std::collections::HashMap;

const MARKER: &str = "VOTE:";

/// Locate the `VOTE:` marker in `text`, decode the JSON object that follows
/// it with a streaming decoder (robust to braces embedded in `rationale`),
/// and strictly validate the shape. Malformed or missing votes return
/// `None` — absence is not an error (§3 Vote, §4.7).
pub fn extract_vote(text: &str) -> Option<Vote> {
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

        let Ok(vote) = serde_json::from_value::<Vote>(value) else {
            continue;
        };

        if vote.is_valid() {
            return Some(vote);
        }
    }
    None
}

/// Aggregate every round's parsed votes into a final tally.
///
/// - `votes_by_round[r]` holds `(participant_identifier, Vote)` pairs for
///   round `r+1`, in participant order, only for participants whose
///   response actually carried a valid vote.
/// - A single strict-maximum option wins; a tie yields no winner.
pub fn aggregate_votes(votes_by_round: &[Vec<(String, Vote)>]) -> AggregatedVotes {
    let mut tally: HashMap<String, u32> = HashMap::new();
    for round in votes_by_round {
        for (_, vote) in round {
            *tally.entry(vote.option.clone()).or_insert(0) += 1;
        }
    }

    let max_count = tally.values().copied().max();
    let (winning_option, consensus_reached) = match max_count {
        None => (None, false),
        Some(max) => {
            let leaders: Vec<&String> = tally
                .iter()
                .filter(|(_, &count)| count == max)
                .map(|(option, _)| option)
                .collect();
            if leaders.len() == 1 {
                (Some(leaders[0].clone()), true)
            } else {
                (None, false)
            }
        }
    };

    AggregatedVotes {
        final_tally: tally,
        consensus_reached,
        winning_option,
    }
}

pub struct AggregatedVotes {
    pub final_tally: HashMap<String, u32>,
    pub consensus_reached: bool,
    pub winning_option: Option<String>,
}

/// Fraction of `votes` carrying `continue_debate == false`, for the
/// model-controlled early-stop check (§4.8 step 6). `votes` is exactly the
/// set of valid votes parsed in the current round (not all participants
/// necessarily voted).
pub fn stop_fraction(votes: &[(String, Vote)], participant_count: usize) -> f64 {
    if participant_count == 0 {
        return 0.0;
    }
    let stopping = votes.iter().filter(|(_, v)| !v.continue_debate).count();
    stopping as f64 / participant_count as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_valid_vote() {
        let text = "I think so.\nVOTE: {\"option\": \"A\", \"confidence\": 0.9, \"rationale\": \"because\", \"continue_debate\": true}\n";
        let vote = extract_vote(text).unwrap();
        assert_eq!(vote.option, "A");
        assert_eq!(vote.confidence, 0.9);
    }

    #[test]
    fn tolerates_braces_inside_rationale() {
        let text = r#"VOTE: {"option": "A", "confidence": 0.5, "rationale": "fn foo() { bar() }", "continue_debate": false}"#;
        let vote = extract_vote(text).unwrap();
        assert_eq!(vote.rationale, "fn foo() { bar() }");
        assert!(!vote.continue_debate);
    }

    #[test]
    fn missing_vote_is_none_not_an_error() {
        assert!(extract_vote("just a plain response").is_none());
    }

    #[test]
    fn out_of_range_confidence_is_rejected() {
        let text = r#"VOTE: {"option": "A", "confidence": 1.5, "rationale": "r"}"#;
        assert!(extract_vote(text).is_none());
    }

    #[test]
    fn default_continue_debate_is_true() {
        let text = r#"VOTE: {"option": "A", "confidence": 0.5, "rationale": "r"}"#;
        let vote = extract_vote(text).unwrap();
        assert!(vote.continue_debate);
    }

    #[test]
    fn single_strict_maximum_wins() {
        let votes_by_round = vec![vec![
            ("a@x".to_string(), make_vote("A")),
            ("b@x".to_string(), make_vote("A")),
            ("c@x".to_string(), make_vote("B")),
        ]];
        let result = aggregate_votes(&votes_by_round);
        assert_eq!(result.winning_option.as_deref(), Some("A"));
        assert!(result.consensus_reached);
    }

    #[test]
    fn strict_tie_has_no_winner() {
        let votes_by_round = vec![vec![
            ("a@x".to_string(), make_vote("A")),
            ("b@x".to_string(), make_vote("B")),
        ]];
        let result = aggregate_votes(&votes_by_round);
        assert_eq!(result.winning_option, None);
        assert!(!result.consensus_reached);
    }

    #[test]
    fn stop_fraction_counts_only_continue_debate_false() {
        let votes = vec![
            ("a@x".to_string(), {
                let mut v = make_vote("A");
                v.continue_debate = false;
                v
            }),
            ("b@x".to_string(), make_vote("B")),
        ];
        assert_eq!(stop_fraction(&votes, 2), 0.5);
    }

    fn make_vote(option: &str) -> Vote {
        Vote {
            option: option.to_string(),
            confidence: 0.8,
            rationale: "r".to_string(),
            continue_debate: true,
        }
    }
}
