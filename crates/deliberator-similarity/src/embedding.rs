//! Neural sentence-embedding cosine similarity. No embedding model ships with
//! this crate, so this backend reports itself unavailable and the service
//! falls back to [`crate::term_weighted::TermWeightedSimilarity`]; a real
//! embedding provider can implement [`SimilarityBackend`] and be substituted
//! in `SimilarityService::with_backend`.

use crate::backend::SimilarityBackend;

#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddingSimilarity;

impl SimilarityBackend for EmbeddingSimilarity {
    fn name(&self) -> &'static str {
        "embedding"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn similarity(&self, _a: &str, _b: &str) -> f64 {
        unreachable!("embedding backend is unavailable; SimilarityService must not select it")
    }
}
