//! TF-IDF cosine similarity over the two-document corpus formed by each pair.

use crate::backend::{tokenize, SimilarityBackend};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default, Clone, Copy)]
pub struct TermWeightedSimilarity;

impl SimilarityBackend for TermWeightedSimilarity {
    fn name(&self) -> &'static str {
        "term_weighted"
    }

    fn similarity(&self, a: &str, b: &str) -> f64 {
        let tokens_a = tokenize(a);
        let tokens_b = tokenize(b);

        if tokens_a.is_empty() && tokens_b.is_empty() {
            return 0.0;
        }

        let tf_a = term_frequencies(&tokens_a);
        let tf_b = term_frequencies(&tokens_b);

        let vocab: HashSet<&String> = tf_a.keys().chain(tf_b.keys()).collect();

        let vec_a: Vec<f64> = vocab.iter().map(|t| tf_a.get(*t).copied().unwrap_or(0.0) * idf(t, &tf_a, &tf_b)).collect();
        let vec_b: Vec<f64> = vocab.iter().map(|t| tf_b.get(*t).copied().unwrap_or(0.0) * idf(t, &tf_a, &tf_b)).collect();

        cosine_similarity(&vec_a, &vec_b)
    }
}

fn term_frequencies(tokens: &[String]) -> HashMap<String, f64> {
    let mut counts: HashMap<String, f64> = HashMap::new();
    for t in tokens {
        *counts.entry(t.clone()).or_insert(0.0) += 1.0;
    }
    let total = tokens.len() as f64;
    if total > 0.0 {
        for v in counts.values_mut() {
            *v /= total;
        }
    }
    counts
}

/// Smoothed IDF over the two-document corpus {a, b}: `ln((1+N)/(1+df)) + 1`.
fn idf(term: &str, tf_a: &HashMap<String, f64>, tf_b: &HashMap<String, f64>) -> f64 {
    let n = 2.0_f64;
    let df = tf_a.contains_key(term) as u8 as f64 + tf_b.contains_key(term) as u8 as f64;
    ((1.0 + n) / (1.0 + df)).ln() + 1.0
}

fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot_product / (norm_a * norm_b)).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_scores_one() {
        let tw = TermWeightedSimilarity;
        assert_eq!(tw.similarity("the quick brown fox", "the quick brown fox"), 1.0);
    }

    #[test]
    fn disjoint_vocab_scores_zero() {
        let tw = TermWeightedSimilarity;
        assert_eq!(tw.similarity("alpha beta gamma", "delta epsilon zeta"), 0.0);
    }

    #[test]
    fn shared_rare_terms_outweigh_shared_common_terms() {
        let tw = TermWeightedSimilarity;
        // "the" appears in both but is common; "quasar" is the rare shared signal.
        let high = tw.similarity("the quasar collapsed", "the quasar brightened");
        let low = tw.similarity("the cat sat", "the dog ran");
        assert!(high > low);
    }

    #[test]
    fn both_empty_scores_zero() {
        let tw = TermWeightedSimilarity;
        assert_eq!(tw.similarity("", ""), 0.0);
    }
}
