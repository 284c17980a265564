//! The round loop: wires backend invocation, the vote and tool
//! subprotocols, convergence detection, and graph persistence into one
//! deliberation (§4.8).

use crate::context::{build_context, build_prompt};
use crate::convergence::ConvergenceDetector;
use crate::error::{EngineError, EngineResult};
use crate::persist::persist_decision;
use crate::summarizer::summarize;
use crate::tools::run_requested_tools;
use crate::transcript::{render_markdown, write_transcript};
use crate::vote::{aggregate_votes, extract_vote, stop_fraction};
use deliberator_backends::{BackendRegistry, Invoke, InvokeRequest};
use deliberator_config::Config;
use deliberator_core::{
    ConvergenceInfo, ConvergenceStatus, DeliberationResult, DeliberationStatus, Mode, OperationId,
    Participant, RoundResponse, VotingResult,
};
use deliberator_graph::{DecisionGraphStore, DecisionRetriever};
use deliberator_log::spans::backend_invocation_span;
use deliberator_similarity::SimilarityService;
use deliberator_tools::ToolRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn, Instrument};

pub struct DeliberationEngine {
    registry: Arc<BackendRegistry>,
    tools: Arc<ToolRegistry>,
    similarity: Arc<SimilarityService>,
    convergence: ConvergenceDetector,
    store: Arc<DecisionGraphStore>,
    retriever: Arc<DecisionRetriever>,
    config: Config,
    working_dir: PathBuf,
}

impl DeliberationEngine {
    pub fn new(
        registry: Arc<BackendRegistry>,
        tools: Arc<ToolRegistry>,
        similarity: Arc<SimilarityService>,
        store: Arc<DecisionGraphStore>,
        retriever: Arc<DecisionRetriever>,
        config: Config,
        working_dir: PathBuf,
    ) -> Self {
        let convergence = ConvergenceDetector::new(
            similarity.clone(),
            config.deliberation.convergence_detection.clone(),
        );
        Self {
            registry,
            tools,
            similarity,
            convergence,
            store,
            retriever,
            config,
            working_dir,
        }
    }

    /// Backend ids resolved at startup, for request validation (§6).
    pub fn known_backend_ids(&self) -> Vec<&str> {
        self.registry.backend_ids().collect()
    }

    /// Run one complete deliberation and persist it.
    #[instrument(skip(self, participants), fields(question, rounds, mode = ?mode))]
    pub async fn deliberate(
        &self,
        question: &str,
        participants: &[Participant],
        rounds: u32,
        mode: Mode,
        context: Option<&str>,
    ) -> EngineResult<DeliberationResult> {
        let requested_rounds = if matches!(mode, Mode::Quick) { 1 } else { rounds };
        let operation_id = OperationId::new().to_string();

        let graph_context = if self.config.decision_graph.enabled {
            let retrieved = self.retriever.retrieve(question).await;
            if retrieved.is_empty() {
                context.map(|c| c.to_string())
            } else {
                Some(match context {
                    Some(extra) if !extra.is_empty() => format!("{extra}\n\n{}", retrieved.markdown),
                    _ => retrieved.markdown,
                })
            }
        } else {
            context.map(|c| c.to_string())
        };

        let mut responses: Vec<RoundResponse> = Vec::new();
        let mut votes_by_round: Vec<Vec<(String, deliberator_core::Vote)>> = Vec::new();
        let mut rounds_completed = 0u32;
        let mut convergence_info: Option<ConvergenceInfo> = None;
        let mut prev_avg_similarity: Option<f64> = None;

        let min_rounds_if_respected = if self.config.deliberation.early_stopping.respect_min_rounds {
            requested_rounds
        } else {
            1
        };

        'rounds: for round in 1..=requested_rounds {
            let context_block = build_context(&responses, if round == 1 { graph_context.as_deref() } else { None });
            let prompt = build_prompt(question);

            let mut round_responses = Vec::with_capacity(participants.len());
            let mut round_votes = Vec::new();

            for participant in participants {
                let identifier = participant.identifier();
                let span = backend_invocation_span(&participant.backend_id, &participant.model_id, round, &identifier);

                let text = self
                    .invoke_participant(participant, &prompt, &context_block, round)
                    .instrument(span)
                    .await;

                let outcomes = run_requested_tools(&self.tools, &text, &self.working_dir, &operation_id).await;
                for outcome in &outcomes {
                    if !outcome.success {
                        warn!(tool = %outcome.tool_name, "advisory tool call failed");
                    }
                }

                if let Some(vote) = extract_vote(&text) {
                    round_votes.push((identifier.clone(), vote));
                }

                round_responses.push(RoundResponse {
                    round,
                    participant: identifier,
                    stance: participant.stance,
                    text,
                    timestamp: chrono::Utc::now(),
                });
            }

            responses.extend(round_responses);
            rounds_completed = round;
            votes_by_round.push(round_votes.clone());

            if self.config.deliberation.early_stopping.enabled
                && round >= min_rounds_if_respected
                && !round_votes.is_empty()
            {
                let fraction = stop_fraction(&round_votes, participants.len());
                if fraction >= self.config.deliberation.early_stopping.threshold {
                    break 'rounds;
                }
            }

            if self.config.deliberation.convergence_detection.enabled
                && round >= self.config.deliberation.convergence_detection.min_rounds_before_check.max(2)
            {
                let current: Vec<RoundResponse> =
                    responses.iter().filter(|r| r.round == round).cloned().collect();
                let previous: Vec<RoundResponse> =
                    responses.iter().filter(|r| r.round == round - 1).cloned().collect();

                let evaluation = self.convergence.evaluate(&previous, &current, prev_avg_similarity);
                prev_avg_similarity = Some(evaluation.avg_similarity);

                if evaluation.status == ConvergenceStatus::Converged {
                    convergence_info = Some(ConvergenceInfo {
                        detected: true,
                        detection_round: Some(round),
                        final_similarity: evaluation.avg_similarity,
                        status: ConvergenceStatus::Converged,
                        per_participant_similarity: evaluation.per_participant_similarity,
                    });
                    break 'rounds;
                }
                if evaluation.status == ConvergenceStatus::Impasse {
                    convergence_info = Some(ConvergenceInfo {
                        detected: false,
                        detection_round: Some(round),
                        final_similarity: evaluation.avg_similarity,
                        status: ConvergenceStatus::Impasse,
                        per_participant_similarity: evaluation.per_participant_similarity,
                    });
                    break 'rounds;
                }

                convergence_info = Some(ConvergenceInfo {
                    detected: false,
                    detection_round: Some(round),
                    final_similarity: evaluation.avg_similarity,
                    status: evaluation.status,
                    per_participant_similarity: evaluation.per_participant_similarity,
                });
            }
        }

        let voting = aggregate_votes(&votes_by_round);
        let voting_result = if voting.final_tally.is_empty() {
            None
        } else {
            Some(VotingResult {
                final_tally: voting.final_tally,
                votes_by_round: votes_by_round.clone(),
                consensus_reached: voting.consensus_reached,
                winning_option: voting.winning_option,
            })
        };

        let preference_order: Vec<(String, String)> = participants
            .iter()
            .map(|p| (p.backend_id.clone(), p.model_id.clone()))
            .collect();
        let summary = summarize(&self.registry, &preference_order, question, &responses, voting_result.as_ref())
            .await;

        let convergence_info = finalize_convergence(convergence_info, voting_result.as_ref());
        let participant_names: Vec<String> = participants.iter().map(|p| p.identifier()).collect();
        let status = if rounds_completed == 0 {
            DeliberationStatus::Failed
        } else if adapter_failure_budget_exceeded(&responses) {
            DeliberationStatus::Partial
        } else {
            DeliberationStatus::Complete
        };

        let markdown = render_markdown(
            question,
            mode,
            rounds_completed,
            status,
            &participant_names,
            &responses,
            voting_result.as_ref(),
            convergence_info.as_ref(),
            &summary,
        );
        let transcript_path = write_transcript(
            std::path::Path::new(&self.config.transcripts.dir),
            question,
            chrono::Utc::now(),
            &markdown,
        )
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default();

        let mut result = DeliberationResult {
            status,
            mode,
            rounds_completed,
            participants: participant_names,
            summary,
            voting_result,
            convergence_info,
            transcript_path,
            full_debate: responses,
            full_debate_truncated: false,
            total_rounds: rounds_completed,
        };

        if self.config.decision_graph.enabled {
            match persist_decision(&self.store, &self.retriever, &self.similarity, &self.config.decision_graph, question, &result).await {
                Ok(id) => info!(decision_id = %id, "deliberation persisted to decision graph"),
                // Best-effort observability: the deliberation result is still returned
                // to the caller even if the write to the decision graph failed.
                Err(e) => warn!(error = %e, "failed to persist deliberation to decision graph"),
            }
        }

        truncate_full_debate(&mut result, self.config.transcripts.max_rounds_in_response);

        Ok(result)
    }

    async fn invoke_participant(&self, participant: &Participant, prompt: &str, context: &str, round: u32) -> String {
        let Some(adapter) = self.registry.get(&participant.backend_id) else {
            let err = EngineError::Validation {
                message: format!("no backend configured for id '{}'", participant.backend_id),
            };
            return err.as_response_text();
        };

        let mut request = InvokeRequest::new(prompt.to_string(), participant.model_id.clone())
            .with_working_directory(self.working_dir.clone());
        if !context.is_empty() {
            request = request.with_context(context.to_string());
        }
        if let Some(effort) = &participant.reasoning_effort {
            request = request.with_reasoning_effort(effort.clone());
        }

        match adapter.invoke(&request).await {
            Ok(text) => text,
            Err(e) => {
                let identifier = participant.identifier();
                EngineError::from_backend_error(e, &participant.backend_id, &identifier, round).as_response_text()
            }
        }
    }
}

/// Response-size control (§6): when the full debate would exceed the
/// configured round cap, keep only the last N rounds in the returned result
/// and mark `full_debate_truncated`; the full transcript stays on disk,
/// unaffected since it is rendered from the untruncated round loop state
/// before this runs.
fn truncate_full_debate(result: &mut DeliberationResult, max_rounds_in_response: u32) {
    if max_rounds_in_response == 0 || result.total_rounds <= max_rounds_in_response {
        return;
    }
    let cutoff = result.total_rounds - max_rounds_in_response;
    result.full_debate.retain(|r| r.round > cutoff);
    result.full_debate_truncated = true;
}

/// A participant response slot becomes this synthetic text on adapter failure
/// (§4.8 step 3, §7 BackendInvocationError/TimeoutError containment).
const ADAPTER_ERROR_MARKER: &str = "[ERROR: ";

/// Fraction of all responses across the deliberation that must be synthetic
/// adapter-failure entries before `status` reports `partial` rather than
/// `complete` (§7: "partial when an early exit occurred due to adapter
/// failure budget being exceeded (implementation-defined)"). Convergence,
/// impasse, and model-controlled early stops are documented successful
/// completion paths and never affect this on their own.
const ADAPTER_FAILURE_BUDGET_FRACTION: f64 = 0.5;

fn adapter_failure_budget_exceeded(responses: &[RoundResponse]) -> bool {
    if responses.is_empty() {
        return false;
    }
    let failures = responses.iter().filter(|r| r.text.starts_with(ADAPTER_ERROR_MARKER)).count();
    (failures as f64 / responses.len() as f64) > ADAPTER_FAILURE_BUDGET_FRACTION
}

/// Vote outcome overrides the detector's status when a vote was taken (§4.8
/// post-processing).
fn finalize_convergence(
    detector_info: Option<ConvergenceInfo>,
    voting_result: Option<&VotingResult>,
) -> Option<ConvergenceInfo> {
    let Some(voting) = voting_result else {
        return detector_info;
    };

    let status = if voting.consensus_reached {
        let unanimous = voting.final_tally.len() == 1;
        if unanimous {
            ConvergenceStatus::UnanimousConsensus
        } else {
            ConvergenceStatus::MajorityDecision
        }
    } else {
        ConvergenceStatus::Tie
    };

    Some(match detector_info {
        Some(mut info) => {
            info.status = status;
            info
        }
        None => ConvergenceInfo {
            detected: matches!(status, ConvergenceStatus::UnanimousConsensus),
            detection_round: None,
            final_similarity: 0.0,
            status,
            per_participant_similarity: Default::default(),
        },
    })
}
