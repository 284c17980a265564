//! Data-model types shared across every deliberator crate.
//!
//! These mirror the request/response shapes a deliberation produces; they
//! carry no behavior of their own (parsing, aggregation, persistence live in
//! `deliberator-engine` and `deliberator-graph`) so that crates on either
//! side of the engine can speak the same vocabulary without depending on it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A participant's declared position going into a deliberation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Neutral,
    For,
    Against,
}

/// How many rounds a deliberation runs before summarizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Forces a single round regardless of the requested round count.
    Quick,
    Conference,
}

/// One AI-model participant in a deliberation. Identity is `model@backend`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub backend_id: String,
    pub model_id: String,
    pub stance: Stance,
    #[serde(default)]
    pub reasoning_effort: Option<String>,
}

impl Participant {
    /// The `model@backend` compound identity used throughout round data.
    pub fn identifier(&self) -> String {
        format!("{}@{}", self.model_id, self.backend_id)
    }
}

/// A structured vote a participant may embed in its response text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub option: String,
    pub confidence: f64,
    pub rationale: String,
    #[serde(default = "default_continue_debate")]
    pub continue_debate: bool,
}

fn default_continue_debate() -> bool {
    true
}

impl Vote {
    /// Validate the vote shape per the subprotocol: non-empty option, confidence
    /// in `[0,1]`. Rationale and continue_debate have no further constraints.
    pub fn is_valid(&self) -> bool {
        !self.option.trim().is_empty() && (0.0..=1.0).contains(&self.confidence)
    }
}

/// One participant's output for one round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundResponse {
    pub round: u32,
    pub participant: String,
    pub stance: Stance,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// The outcome of a round-over-round semantic similarity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceStatus {
    Converged,
    Impasse,
    Refining,
    Diverging,
    UnanimousConsensus,
    MajorityDecision,
    Tie,
    Unknown,
}

/// Final convergence/impasse/vote-override report attached to a deliberation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceInfo {
    pub detected: bool,
    pub detection_round: Option<u32>,
    pub final_similarity: f64,
    pub status: ConvergenceStatus,
    pub per_participant_similarity: HashMap<String, f64>,
}

/// Aggregated vote outcome across all rounds of a deliberation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingResult {
    pub final_tally: HashMap<String, u32>,
    pub votes_by_round: Vec<Vec<(String, Vote)>>,
    pub consensus_reached: bool,
    pub winning_option: Option<String>,
}

/// The final AI-generated summary of a deliberation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub consensus: String,
    pub key_agreements: Vec<String>,
    pub key_disagreements: Vec<String>,
    pub final_recommendation: String,
}

/// Overall outcome status of a deliberation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliberationStatus {
    Complete,
    Partial,
    Failed,
}

/// The full result of a `deliberate` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliberationResult {
    pub status: DeliberationStatus,
    pub mode: Mode,
    pub rounds_completed: u32,
    pub participants: Vec<String>,
    pub summary: Summary,
    pub voting_result: Option<VotingResult>,
    pub convergence_info: Option<ConvergenceInfo>,
    pub transcript_path: String,
    pub full_debate: Vec<RoundResponse>,
    #[serde(default)]
    pub full_debate_truncated: bool,
    #[serde(default)]
    pub total_rounds: u32,
}
