//! Word-set Jaccard similarity. Always available; the floor every other
//! backend falls back to when its own dependencies are unavailable.

use crate::backend::{tokenize, SimilarityBackend};
use std::collections::HashSet;

#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalSimilarity;

impl SimilarityBackend for LexicalSimilarity {
    fn name(&self) -> &'static str {
        "lexical"
    }

    fn similarity(&self, a: &str, b: &str) -> f64 {
        let set_a: HashSet<String> = tokenize(a).into_iter().collect();
        let set_b: HashSet<String> = tokenize(b).into_iter().collect();

        if set_a.is_empty() && set_b.is_empty() {
            return 0.0;
        }

        let intersection = set_a.intersection(&set_b).count();
        let union = set_a.union(&set_b).count();

        if union == 0 {
            0.0
        } else {
            intersection as f64 / union as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_sets_score_one() {
        let lex = LexicalSimilarity;
        assert_eq!(lex.similarity("the quick fox", "the quick fox"), 1.0);
    }

    #[test]
    fn disjoint_sets_score_zero() {
        let lex = LexicalSimilarity;
        assert_eq!(lex.similarity("alpha beta", "gamma delta"), 0.0);
    }

    #[test]
    fn partial_overlap_is_between_bounds() {
        let lex = LexicalSimilarity;
        let score = lex.similarity("the quick brown fox", "the slow brown dog");
        assert!(score > 0.0 && score < 1.0);
    }

    #[test]
    fn both_empty_scores_zero() {
        let lex = LexicalSimilarity;
        assert_eq!(lex.similarity("", ""), 0.0);
    }
}
