//! Text similarity scoring for convergence detection and decision-graph
//! retrieval. Exposes a single [`SimilarityService::similarity`] entry point
//! backed by one of three pluggable scorers, chosen at startup in
//! preference order: embedding, term-weighted, lexical.

mod backend;
mod embedding;
mod lexical;
mod term_weighted;

pub use backend::SimilarityBackend;
pub use embedding::EmbeddingSimilarity;
pub use lexical::LexicalSimilarity;
pub use term_weighted::TermWeightedSimilarity;

/// Scores text similarity via the best available backend, always yielding
/// 1.0 for identical inputs and 0.0 when both inputs are empty regardless of
/// which backend is selected.
pub struct SimilarityService {
    backend: Box<dyn SimilarityBackend>,
}

impl SimilarityService {
    /// Select the best available backend in preference order: embedding,
    /// term-weighted, lexical. Lexical is always available and used as the
    /// floor.
    pub fn new() -> Self {
        let candidates: Vec<Box<dyn SimilarityBackend>> = vec![
            Box::new(EmbeddingSimilarity),
            Box::new(TermWeightedSimilarity),
            Box::new(LexicalSimilarity),
        ];

        let backend = candidates
            .into_iter()
            .find(|b| b.is_available())
            .unwrap_or_else(|| Box::new(LexicalSimilarity));

        tracing::info!(backend = backend.name(), "similarity backend selected");
        Self { backend }
    }

    /// Use a specific backend, bypassing preference-order selection.
    pub fn with_backend(backend: Box<dyn SimilarityBackend>) -> Self {
        Self { backend }
    }

    /// Name of the backend currently in use.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Score the similarity of `a` and `b` in `[0,1]`. Identical inputs
    /// always score 1.0; inputs that are both empty always score 0.0.
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return if a.is_empty() { 0.0 } else { 1.0 };
        }
        if a.trim().is_empty() && b.trim().is_empty() {
            return 0.0;
        }
        self.backend.similarity(a, b).clamp(0.0, 1.0)
    }
}

impl Default for SimilarityService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_order_skips_unavailable_embedding_backend() {
        let service = SimilarityService::new();
        assert_eq!(service.backend_name(), "term_weighted");
    }

    #[test]
    fn identical_inputs_always_score_one() {
        let service = SimilarityService::new();
        assert_eq!(service.similarity("same text", "same text"), 1.0);
    }

    #[test]
    fn empty_inputs_always_score_zero() {
        let service = SimilarityService::new();
        assert_eq!(service.similarity("", ""), 0.0);
    }

    #[test]
    fn explicit_lexical_backend_is_honored() {
        let service = SimilarityService::with_backend(Box::new(LexicalSimilarity));
        assert_eq!(service.backend_name(), "lexical");
    }
}
