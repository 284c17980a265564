//! The pluggable similarity backend contract.

/// Computes a `[0,1]` similarity score between two pieces of text.
///
/// Implementations never see the identical-input or empty-input shortcuts;
/// those are handled once, centrally, by [`crate::SimilarityService`].
pub trait SimilarityBackend: Send + Sync {
    /// Backend name, used in logs and `ConvergenceInfo` diagnostics.
    fn name(&self) -> &'static str;

    /// Whether this backend's dependencies are usable in this process.
    /// The lexical backend is always available; it is the floor every
    /// other backend falls back to.
    fn is_available(&self) -> bool {
        true
    }

    /// Score the similarity of `a` and `b` in `[0,1]`.
    fn similarity(&self, a: &str, b: &str) -> f64;
}

/// Lowercase, split on non-alphanumeric boundaries, drop empty tokens.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}
