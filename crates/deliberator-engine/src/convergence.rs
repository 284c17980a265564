//! The convergence detector (§4.4): per-participant similarity of
//! consecutive-round responses, aggregated and classified into a round
//! status. Consulted only from round 2 onward.

use deliberator_config::ConvergenceDetectionConfig;
use deliberator_core::{ConvergenceStatus, RoundResponse};
use deliberator_similarity::SimilarityService;
use std::collections::HashMap;
use std::sync::Arc;

/// One round's convergence evaluation.
#[derive(Debug, Clone)]
pub struct RoundConvergence {
    pub per_participant_similarity: HashMap<String, f64>,
    pub min_similarity: f64,
    pub avg_similarity: f64,
    pub status: ConvergenceStatus,
}

pub struct ConvergenceDetector {
    similarity: Arc<SimilarityService>,
    config: ConvergenceDetectionConfig,
}

impl ConvergenceDetector {
    pub fn new(similarity: Arc<SimilarityService>, config: ConvergenceDetectionConfig) -> Self {
        Self { similarity, config }
    }

    /// Score round `current` against round `previous` for every participant
    /// present in both, then classify. `prev_avg_similarity` is the average
    /// similarity computed for the prior round-pair (`None` if this is the
    /// first check, i.e. evaluating rounds 1-2), used for the "refining"
    /// trend comparison.
    pub fn evaluate(
        &self,
        previous: &[RoundResponse],
        current: &[RoundResponse],
        prev_avg_similarity: Option<f64>,
    ) -> RoundConvergence {
        let mut previous_by_participant: HashMap<&str, &RoundResponse> = HashMap::new();
        for r in previous {
            previous_by_participant.insert(r.participant.as_str(), r);
        }

        let mut per_participant_similarity = HashMap::new();
        for r in current {
            if let Some(prev) = previous_by_participant.get(r.participant.as_str()) {
                let score = self.similarity.similarity(&prev.text, &r.text);
                per_participant_similarity.insert(r.participant.clone(), score);
            }
        }

        let scores: Vec<f64> = per_participant_similarity.values().copied().collect();
        let min_similarity = scores.iter().copied().fold(f64::INFINITY, f64::min);
        let min_similarity = if min_similarity.is_finite() { min_similarity } else { 0.0 };
        let avg_similarity = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };

        let status = self.classify(&scores, avg_similarity, prev_avg_similarity);

        RoundConvergence {
            per_participant_similarity,
            min_similarity,
            avg_similarity,
            status,
        }
    }

    fn classify(
        &self,
        scores: &[f64],
        avg_similarity: f64,
        prev_avg_similarity: Option<f64>,
    ) -> ConvergenceStatus {
        if scores.is_empty() {
            return ConvergenceStatus::Unknown;
        }

        if scores.iter().all(|&s| s >= self.config.semantic_similarity_threshold) {
            return ConvergenceStatus::Converged;
        }
        if scores.iter().all(|&s| s <= self.config.divergence_threshold) {
            return ConvergenceStatus::Impasse;
        }
        if let Some(prev_avg) = prev_avg_similarity {
            if avg_similarity > prev_avg {
                return ConvergenceStatus::Refining;
            }
        }
        ConvergenceStatus::Diverging
    }
}
