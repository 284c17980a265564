//! Graph-scoped entities: persisted indefinitely, never mutated after insert.

use chrono::{DateTime, Utc};
use deliberator_core::{ConvergenceStatus, DecisionId};
use serde::{Deserialize, Serialize};

pub const FINAL_POSITION_MAX_CHARS: usize = 500;

/// One completed deliberation, stored once and never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionNode {
    pub id: DecisionId,
    pub question: String,
    pub timestamp: DateTime<Utc>,
    pub consensus: String,
    pub winning_option: Option<String>,
    pub convergence_status: ConvergenceStatus,
    pub participants: Vec<String>,
    pub transcript_path: String,
    pub metadata: serde_json::Value,
}

/// One participant's final position within a stored decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantStance {
    pub decision_id: DecisionId,
    pub participant: String,
    pub vote_option: Option<String>,
    pub confidence: Option<f64>,
    pub rationale: Option<String>,
    pub final_position: String,
}

impl ParticipantStance {
    /// Build a stance, truncating `final_position` to the persisted limit.
    pub fn new(
        decision_id: DecisionId,
        participant: impl Into<String>,
        vote_option: Option<String>,
        confidence: Option<f64>,
        rationale: Option<String>,
        final_position: &str,
    ) -> Self {
        Self {
            decision_id,
            participant: participant.into(),
            vote_option,
            confidence,
            rationale,
            final_position: truncate_chars(final_position, FINAL_POSITION_MAX_CHARS),
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// A directed similarity edge from a newer decision to an older one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionSimilarity {
    pub source_id: DecisionId,
    pub target_id: DecisionId,
    pub score: f64,
    pub computed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_position_truncates_to_five_hundred_chars() {
        let long = "x".repeat(600);
        let stance = ParticipantStance::new(DecisionId::new(), "opus@claude", None, None, None, &long);
        assert_eq!(stance.final_position.chars().count(), FINAL_POSITION_MAX_CHARS);
    }

    #[test]
    fn short_final_position_is_unchanged() {
        let stance = ParticipantStance::new(DecisionId::new(), "opus@claude", None, None, None, "short");
        assert_eq!(stance.final_position, "short");
    }
}
