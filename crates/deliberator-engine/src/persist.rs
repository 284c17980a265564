//! Persists a completed deliberation into the decision graph (§4.9): one
//! decision node, one stance per participant, and — when enabled — directed
//! similarity edges to recent decisions. Never blocks the result the caller
//! already has: failures here are logged and reported via `EngineError`, but
//! the deliberation itself is already `Complete`/`Partial` by the time this
//! runs.

use crate::vote::extract_vote;
use deliberator_config::DecisionGraphConfig;
use deliberator_core::{DecisionId, DeliberationResult, RoundResponse};
use deliberator_graph::{DecisionGraphStore, DecisionNode, DecisionRetriever, ParticipantStance};
use deliberator_similarity::SimilarityService;
use std::collections::HashMap;
use tracing::{instrument, warn};

fn last_response_per_participant(full_debate: &[RoundResponse]) -> HashMap<&str, &RoundResponse> {
    let mut latest: HashMap<&str, &RoundResponse> = HashMap::new();
    for response in full_debate {
        latest
            .entry(response.participant.as_str())
            .and_modify(|existing| {
                if response.round >= existing.round {
                    *existing = response;
                }
            })
            .or_insert(response);
    }
    latest
}

/// Store `result` as a new decision node plus one stance per participant,
/// then (when `config.compute_similarities`) score it against recent
/// decisions and upsert similarity edges above the noise floor. Invalidates
/// the retriever's query cache so the write is immediately visible.
#[instrument(skip(store, retriever, similarity, config, result, question))]
pub async fn persist_decision(
    store: &DecisionGraphStore,
    retriever: &DecisionRetriever,
    similarity: &SimilarityService,
    config: &DecisionGraphConfig,
    question: &str,
    result: &DeliberationResult,
) -> deliberator_graph::GraphResult<DecisionId> {
    let decision_id = DecisionId::new();
    let convergence_status = result
        .convergence_info
        .as_ref()
        .map(|c| c.status)
        .unwrap_or(deliberator_core::ConvergenceStatus::Unknown);

    let node = DecisionNode {
        id: decision_id,
        question: question.to_string(),
        timestamp: chrono::Utc::now(),
        consensus: result.summary.consensus.clone(),
        winning_option: result
            .voting_result
            .as_ref()
            .and_then(|v| v.winning_option.clone()),
        convergence_status,
        participants: result.participants.clone(),
        transcript_path: result.transcript_path.clone(),
        metadata: serde_json::json!({
            "mode": result.mode,
            "rounds_completed": result.rounds_completed,
            "status": result.status,
        }),
    };
    store.insert_decision_node(&node).await?;

    let latest = last_response_per_participant(&result.full_debate);
    for participant in &result.participants {
        let Some(response) = latest.get(participant.as_str()) else {
            continue;
        };
        let vote = extract_vote(&response.text);
        let stance = ParticipantStance::new(
            decision_id,
            participant.clone(),
            vote.as_ref().map(|v| v.option.clone()),
            vote.as_ref().map(|v| v.confidence),
            vote.as_ref().map(|v| v.rationale.clone()),
            &response.text,
        );
        if let Err(e) = store.insert_stance(&stance).await {
            warn!(participant, error = %e, "failed to persist participant stance");
        }
    }

    if config.compute_similarities {
        if let Err(e) = compute_similarity_edges(store, similarity, config, decision_id, question).await {
            warn!(error = %e, "failed to compute similarity edges for new decision");
        }
    }

    retriever.invalidate().await;

    Ok(decision_id)
}

/// Score a new decision against at most this many of the most-recent prior
/// decisions when computing similarity edges (§4.9 step 3).
const SIMILARITY_CANDIDATE_LIMIT: i64 = 100;

/// Minimum score to persist a similarity edge (§4.9 step 3).
const SIMILARITY_EDGE_FLOOR: f64 = 0.5;

async fn compute_similarity_edges(
    store: &DecisionGraphStore,
    similarity: &SimilarityService,
    _config: &DecisionGraphConfig,
    source_id: DecisionId,
    question: &str,
) -> deliberator_graph::GraphResult<()> {
    let recent = store.list_recent(SIMILARITY_CANDIDATE_LIMIT, 0).await?;
    for candidate in recent {
        if candidate.id == source_id {
            continue;
        }
        let score = similarity.similarity(question, &candidate.question);
        if score < SIMILARITY_EDGE_FLOOR {
            continue;
        }
        let edge = deliberator_graph::DecisionSimilarity {
            source_id,
            target_id: candidate.id,
            score,
            computed_at: chrono::Utc::now(),
        };
        store.upsert_similarity(&edge).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use deliberator_core::{DeliberationStatus, Mode, Stance, Summary};
    use std::sync::Arc;

    fn sample_result() -> DeliberationResult {
        DeliberationResult {
            status: DeliberationStatus::Complete,
            mode: Mode::Quick,
            rounds_completed: 1,
            participants: vec!["opus@claude".to_string()],
            summary: Summary {
                consensus: "We should ship it".to_string(),
                key_agreements: vec![],
                key_disagreements: vec![],
                final_recommendation: "Ship it".to_string(),
            },
            voting_result: None,
            convergence_info: None,
            transcript_path: "transcripts/x.md".to_string(),
            full_debate: vec![RoundResponse {
                round: 1,
                participant: "opus@claude".to_string(),
                stance: Stance::For,
                text: "VOTE: {\"option\": \"ship\", \"confidence\": 0.9, \"rationale\": \"ready\"}".to_string(),
                timestamp: Utc::now(),
            }],
            full_debate_truncated: false,
            total_rounds: 1,
        }
    }

    #[tokio::test]
    async fn persists_decision_node_and_stance() {
        let store = Arc::new(DecisionGraphStore::in_memory().await.unwrap());
        let similarity = Arc::new(SimilarityService::new());
        let config = DecisionGraphConfig::default();
        let retriever = DecisionRetriever::new(store.clone(), similarity.clone(), config.clone());

        let result = sample_result();
        let id = persist_decision(&store, &retriever, &similarity, &config, "Should we ship?", &result)
            .await
            .unwrap();

        let fetched = store.get_decision(id).await.unwrap().unwrap();
        assert_eq!(fetched.question, "Should we ship?");

        let stances = store.list_stances(id).await.unwrap();
        assert_eq!(stances.len(), 1);
        assert_eq!(stances[0].vote_option.as_deref(), Some("ship"));
    }

    #[tokio::test]
    async fn similarity_edges_are_created_against_prior_decisions() {
        let store = Arc::new(DecisionGraphStore::in_memory().await.unwrap());
        let similarity = Arc::new(SimilarityService::new());
        let config = DecisionGraphConfig::default();
        let retriever = DecisionRetriever::new(store.clone(), similarity.clone(), config.clone());

        let first = persist_decision(
            &store,
            &retriever,
            &similarity,
            &config,
            "Should we adopt TypeScript for the frontend?",
            &sample_result(),
        )
        .await
        .unwrap();

        let second = persist_decision(
            &store,
            &retriever,
            &similarity,
            &config,
            "Should we adopt TypeScript for the frontend?",
            &sample_result(),
        )
        .await
        .unwrap();

        let similar = store.list_similar(second, 0.0, 10).await.unwrap();
        assert!(similar.iter().any(|s| s.target_id == first));
    }
}
