//! The three RPC-surface operations (§6): `deliberate`, `query_decisions`,
//! `analyze_decisions`. The outer transport (a JSON-RPC stdio server) is out
//! of scope here; these are plain async functions any such transport calls
//! into.

use crate::error::{EngineError, EngineResult};
use crate::orchestrator::DeliberationEngine;
use deliberator_core::{DecisionId, DeliberationResult, Mode, Participant};
use deliberator_graph::DecisionGraphStore;
use deliberator_similarity::SimilarityService;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

const MIN_QUESTION_LEN: usize = 10;
const MIN_PARTICIPANTS: usize = 2;
const MAX_ROUNDS: u32 = 5;
const DEFAULT_ROUNDS: u32 = 2;
const DEFAULT_QUERY_LIMIT: u32 = 5;

/// Request shape for `deliberate`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliberateRequest {
    pub question: String,
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub rounds: Option<u32>,
    #[serde(default)]
    pub mode: Option<Mode>,
    #[serde(default)]
    pub context: Option<String>,
}

fn validate_deliberate_request(request: &DeliberateRequest, known_backends: &[&str]) -> EngineResult<()> {
    if request.question.trim().chars().count() < MIN_QUESTION_LEN {
        return Err(EngineError::Validation {
            message: format!("question must be at least {MIN_QUESTION_LEN} characters"),
        });
    }
    if request.participants.len() < MIN_PARTICIPANTS {
        return Err(EngineError::Validation {
            message: format!("at least {MIN_PARTICIPANTS} participants are required"),
        });
    }
    if let Some(rounds) = request.rounds {
        if !(1..=MAX_ROUNDS).contains(&rounds) {
            return Err(EngineError::Validation {
                message: format!("rounds must be in [1, {MAX_ROUNDS}]"),
            });
        }
    }
    for participant in &request.participants {
        if !known_backends.contains(&participant.backend_id.as_str()) {
            return Err(EngineError::Validation {
                message: format!("unknown backend '{}'", participant.backend_id),
            });
        }
        if participant.model_id.trim().is_empty() {
            return Err(EngineError::Validation {
                message: "participant model id must not be empty".to_string(),
            });
        }
    }
    Ok(())
}

/// Run a validated deliberation. Model ids are accepted unconditionally and
/// passed straight to the backend adapter: the engine has no model catalog,
/// so there is nothing to warn against beyond the backend id check already
/// performed above (§6 "unrecognized models... produce a warning, not an
/// error" describes a check this engine has no catalog to perform).
pub async fn deliberate(engine: &DeliberationEngine, request: DeliberateRequest) -> EngineResult<DeliberationResult> {
    let known_backends: Vec<&str> = engine.known_backend_ids();
    validate_deliberate_request(&request, &known_backends)?;

    let rounds = request.rounds.unwrap_or(DEFAULT_ROUNDS);
    let mode = request.mode.unwrap_or(Mode::Quick);

    engine
        .deliberate(&request.question, &request.participants, rounds, mode, request.context.as_deref())
        .await
}

/// Request shape for `query_decisions`. Exactly one of `query_text`,
/// `find_contradictions`, `decision_id` selects the active mode.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryDecisionsRequest {
    #[serde(default)]
    pub query_text: Option<String>,
    #[serde(default)]
    pub find_contradictions: bool,
    #[serde(default)]
    pub decision_id: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimilarDecisionSummary {
    pub decision_id: String,
    pub question: String,
    pub consensus: String,
    pub winning_option: Option<String>,
    pub similarity: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContradictionPair {
    pub first: SimilarDecisionSummary,
    pub second: SimilarDecisionSummary,
    pub similarity: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum QueryDecisionsResponse {
    SimilarDecisions { results: Vec<SimilarDecisionSummary> },
    Contradictions { results: Vec<ContradictionPair> },
    EvolutionTimeline { results: Vec<SimilarDecisionSummary> },
}

/// `query_decisions` candidate window: bounded the same way retrieval is.
const QUERY_CANDIDATE_WINDOW: i64 = 1000;

pub async fn query_decisions(
    store: &DecisionGraphStore,
    similarity: &SimilarityService,
    request: QueryDecisionsRequest,
) -> EngineResult<QueryDecisionsResponse> {
    let active_modes = [
        request.query_text.is_some(),
        request.find_contradictions,
        request.decision_id.is_some(),
    ]
    .iter()
    .filter(|b| **b)
    .count();
    if active_modes != 1 {
        return Err(EngineError::Validation {
            message: "exactly one of query_text, find_contradictions, decision_id must be set".to_string(),
        });
    }

    let limit = request.limit.unwrap_or(DEFAULT_QUERY_LIMIT) as usize;

    if let Some(query_text) = &request.query_text {
        let candidates = store.list_recent(QUERY_CANDIDATE_WINDOW, 0).await?;
        let mut scored: Vec<SimilarDecisionSummary> = candidates
            .into_iter()
            .map(|node| {
                let score = similarity.similarity(query_text, &node.question);
                SimilarDecisionSummary {
                    decision_id: node.id.to_string(),
                    question: node.question,
                    consensus: node.consensus,
                    winning_option: node.winning_option,
                    similarity: score,
                }
            })
            .filter(|s| s.similarity > 0.0)
            .collect();
        scored.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        return Ok(QueryDecisionsResponse::SimilarDecisions { results: scored });
    }

    if request.find_contradictions {
        let candidates = store.list_recent(QUERY_CANDIDATE_WINDOW, 0).await?;
        let mut pairs = Vec::new();
        for i in 0..candidates.len() {
            for j in (i + 1)..candidates.len() {
                let a = &candidates[i];
                let b = &candidates[j];
                let (Some(option_a), Some(option_b)) = (&a.winning_option, &b.winning_option) else {
                    continue;
                };
                if option_a == option_b {
                    continue;
                }
                let score = similarity.similarity(&a.question, &b.question);
                if score < 0.6 {
                    continue;
                }
                pairs.push(ContradictionPair {
                    first: SimilarDecisionSummary {
                        decision_id: a.id.to_string(),
                        question: a.question.clone(),
                        consensus: a.consensus.clone(),
                        winning_option: a.winning_option.clone(),
                        similarity: score,
                    },
                    second: SimilarDecisionSummary {
                        decision_id: b.id.to_string(),
                        question: b.question.clone(),
                        consensus: b.consensus.clone(),
                        winning_option: b.winning_option.clone(),
                        similarity: score,
                    },
                    similarity: score,
                });
            }
        }
        pairs.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        pairs.truncate(limit);
        return Ok(QueryDecisionsResponse::Contradictions { results: pairs });
    }

    let decision_id_str = request.decision_id.as_deref().expect("exactly one mode checked above");
    let decision_id = DecisionId::parse(decision_id_str).map_err(|_| EngineError::Validation {
        message: format!("invalid decision_id '{decision_id_str}'"),
    })?;
    let Some(anchor) = store.get_decision(decision_id).await? else {
        return Err(EngineError::Validation {
            message: format!("no decision found with id '{decision_id_str}'"),
        });
    };

    let similar = store.list_similar(decision_id, 0.0, limit as i64).await?;
    let mut timeline = vec![SimilarDecisionSummary {
        decision_id: anchor.id.to_string(),
        question: anchor.question,
        consensus: anchor.consensus,
        winning_option: anchor.winning_option,
        similarity: 1.0,
    }];
    for edge in similar {
        if let Some(node) = store.get_decision(edge.target_id).await? {
            timeline.push(SimilarDecisionSummary {
                decision_id: node.id.to_string(),
                question: node.question,
                consensus: node.consensus,
                winning_option: node.winning_option,
                similarity: edge.score,
            });
        }
    }

    Ok(QueryDecisionsResponse::EvolutionTimeline { results: timeline })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzeDecisionsRequest {
    #[serde(default)]
    pub participant: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VotingPattern {
    pub participant: String,
    pub total_votes: u32,
    pub avg_confidence: f64,
    pub preferred_options: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeDecisionsResponse {
    pub total_decisions: u32,
    pub total_participants: u32,
    pub voting_patterns: Vec<VotingPattern>,
    pub convergence_statistics: HashMap<String, u32>,
    pub avg_participants_per_decision: f64,
}

/// Aggregate analysis window: same bound as `query_decisions`'s candidate scan.
const ANALYSIS_WINDOW: i64 = 1000;

pub async fn analyze_decisions(
    store: &DecisionGraphStore,
    request: AnalyzeDecisionsRequest,
) -> EngineResult<AnalyzeDecisionsResponse> {
    let decisions = store.list_recent(ANALYSIS_WINDOW, 0).await?;
    let total_decisions = decisions.len() as u32;

    let mut convergence_statistics: HashMap<String, u32> = HashMap::new();
    let mut all_participants: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut votes_by_participant: HashMap<String, Vec<(String, f64)>> = HashMap::new();
    let mut total_participant_slots = 0u32;

    for decision in &decisions {
        *convergence_statistics.entry(format!("{:?}", decision.convergence_status)).or_insert(0) += 1;
        total_participant_slots += decision.participants.len() as u32;
        all_participants.extend(decision.participants.iter().cloned());

        let stances = match store.list_stances(decision.id).await {
            Ok(s) => s,
            Err(e) => {
                warn!(decision_id = %decision.id, error = %e, "failed to load stances for analysis");
                continue;
            }
        };
        for stance in stances {
            if let Some(filter) = &request.participant {
                if &stance.participant != filter {
                    continue;
                }
            }
            if let Some(option) = stance.vote_option {
                votes_by_participant
                    .entry(stance.participant.clone())
                    .or_default()
                    .push((option, stance.confidence.unwrap_or(0.0)));
            }
        }
    }

    let mut voting_patterns: Vec<VotingPattern> = votes_by_participant
        .into_iter()
        .map(|(participant, votes)| {
            let total_votes = votes.len() as u32;
            let avg_confidence = if votes.is_empty() {
                0.0
            } else {
                votes.iter().map(|(_, c)| c).sum::<f64>() / votes.len() as f64
            };

            let mut counts: HashMap<&str, u32> = HashMap::new();
            for (option, _) in &votes {
                *counts.entry(option.as_str()).or_insert(0) += 1;
            }
            let mut preferred_options: Vec<(&str, u32)> = counts.into_iter().collect();
            preferred_options.sort_by(|a, b| b.1.cmp(&a.1));

            VotingPattern {
                participant,
                total_votes,
                avg_confidence,
                preferred_options: preferred_options.into_iter().map(|(o, _)| o.to_string()).collect(),
            }
        })
        .collect();
    voting_patterns.sort_by(|a, b| a.participant.cmp(&b.participant));

    let avg_participants_per_decision = if total_decisions == 0 {
        0.0
    } else {
        total_participant_slots as f64 / total_decisions as f64
    };

    Ok(AnalyzeDecisionsResponse {
        total_decisions,
        total_participants: all_participants.len() as u32,
        voting_patterns,
        convergence_statistics,
        avg_participants_per_decision,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> DeliberateRequest {
        DeliberateRequest {
            question: "Should we adopt TypeScript?".to_string(),
            participants: vec![
                Participant {
                    backend_id: "claude".to_string(),
                    model_id: "opus".to_string(),
                    stance: deliberator_core::Stance::Neutral,
                    reasoning_effort: None,
                },
                Participant {
                    backend_id: "claude".to_string(),
                    model_id: "sonnet".to_string(),
                    stance: deliberator_core::Stance::Neutral,
                    reasoning_effort: None,
                },
            ],
            rounds: Some(2),
            mode: None,
            context: None,
        }
    }

    #[test]
    fn rejects_too_short_question() {
        let mut request = sample_request();
        request.question = "too short".to_string();
        let result = validate_deliberate_request(&request, &["claude"]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_too_few_participants() {
        let mut request = sample_request();
        request.participants.truncate(1);
        let result = validate_deliberate_request(&request, &["claude"]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_out_of_range_rounds() {
        let mut request = sample_request();
        request.rounds = Some(6);
        let result = validate_deliberate_request(&request, &["claude"]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_unknown_backend() {
        let request = sample_request();
        let result = validate_deliberate_request(&request, &["some-other-backend"]);
        assert!(result.is_err());
    }

    #[test]
    fn accepts_a_well_formed_request() {
        let request = sample_request();
        let result = validate_deliberate_request(&request, &["claude"]);
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn query_decisions_rejects_ambiguous_mode_selection() {
        let store = DecisionGraphStore::in_memory().await.unwrap();
        let similarity = SimilarityService::new();
        let request = QueryDecisionsRequest {
            query_text: Some("x".to_string()),
            find_contradictions: true,
            ..Default::default()
        };
        let result = query_decisions(&store, &similarity, request).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn query_decisions_rejects_no_mode_selection() {
        let store = DecisionGraphStore::in_memory().await.unwrap();
        let similarity = SimilarityService::new();
        let result = query_decisions(&store, &similarity, QueryDecisionsRequest::default()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn analyze_decisions_on_empty_store_reports_zeroes() {
        let store = DecisionGraphStore::in_memory().await.unwrap();
        let response = analyze_decisions(&store, AnalyzeDecisionsRequest::default()).await.unwrap();
        assert_eq!(response.total_decisions, 0);
        assert_eq!(response.total_participants, 0);
    }
}
