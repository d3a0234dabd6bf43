//! Near-duplicate query suppression.
//!
//! Similarity is Jaccard over lower-cased whitespace-token sets:
//!
//! ```text
//! J(A, B) = |A ∩ B| / |A ∪ B|      (0 when the union is empty)
//! ```
//!
//! A query is a duplicate when `J >= threshold` against any registered
//! query. The first match in registration order wins.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_SIMILARITY_THRESHOLD;
use crate::hats::Hat;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredQuery {
    pub query: String,
    pub hat: Hat,
}

/// A registered query that the candidate was found to duplicate.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateMatch {
    pub query: String,
    pub hat: Hat,
    pub similarity: f64,
}

fn token_set(text: &str) -> HashSet<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let a = token_set(a);
    let b = token_set(b);
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

#[derive(Debug, Clone)]
pub struct DuplicateDetector {
    threshold: f64,
    registry: Vec<RegisteredQuery>,
}

impl DuplicateDetector {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            registry: Vec::new(),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// First entry of `registry` that `new_query` duplicates, if any.
    pub fn is_duplicate(
        &self,
        new_query: &str,
        registry: &[RegisteredQuery],
    ) -> Option<DuplicateMatch> {
        registry.iter().find_map(|entry| {
            let similarity = jaccard_similarity(new_query, &entry.query);
            (similarity >= self.threshold).then(|| DuplicateMatch {
                query: entry.query.clone(),
                hat: entry.hat,
                similarity,
            })
        })
    }

    /// Check `new_query` against this detector's own registry.
    pub fn find_duplicate(&self, new_query: &str) -> Option<DuplicateMatch> {
        self.is_duplicate(new_query, &self.registry)
    }

    pub fn register(&mut self, query: impl Into<String>, hat: Hat) {
        self.registry.push(RegisteredQuery {
            query: query.into(),
            hat,
        });
    }

    pub fn all_registered(&self) -> &[RegisteredQuery] {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn clear(&mut self) {
        self.registry.clear();
    }
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similarity_is_case_insensitive_and_symmetric() {
        let a = "Quantum Computing basics";
        let b = "quantum computing BASICS explained";
        assert!((jaccard_similarity(a, b) - 0.75).abs() < 1e-9);
        assert_eq!(jaccard_similarity(a, b), jaccard_similarity(b, a));
    }

    #[test]
    fn empty_strings_are_never_similar() {
        assert_eq!(jaccard_similarity("", ""), 0.0);
        assert_eq!(jaccard_similarity("   ", "word"), 0.0);
        let mut d = DuplicateDetector::default();
        d.register("", Hat::White);
        assert!(d.find_duplicate("").is_none());
    }

    #[test]
    fn synonym_swap_is_below_default_threshold() {
        // 2 shared tokens out of 4 distinct.
        let sim = jaccard_similarity("startup funding risks", "startup funding dangers");
        assert!((sim - 0.5).abs() < 1e-9);

        let mut d = DuplicateDetector::default();
        d.register("startup funding risks", Hat::Black);
        assert!(d.find_duplicate("startup funding dangers").is_none());

        let mut loose = DuplicateDetector::new(0.5);
        loose.register("startup funding risks", Hat::Black);
        let m = loose.find_duplicate("startup funding dangers").unwrap();
        assert_eq!(m.hat, Hat::Black);
        assert_eq!(m.query, "startup funding risks");
    }

    #[test]
    fn first_match_in_registration_order_wins() {
        let mut d = DuplicateDetector::new(0.5);
        d.register("solar panel cost", Hat::White);
        d.register("solar panel cost facts", Hat::Yellow);

        let m = d.find_duplicate("solar panel cost facts").unwrap();
        assert_eq!(m.hat, Hat::White, "earlier entry is reported even if a later one is exact");
        assert!(m.similarity < 1.0);
    }

    #[test]
    fn identical_query_is_duplicate() {
        let mut d = DuplicateDetector::default();
        d.register("electric cars facts statistics", Hat::White);
        let m = d.find_duplicate("Electric cars facts statistics").unwrap();
        assert_eq!(m.similarity, 1.0);
    }

    #[test]
    fn is_duplicate_checks_the_given_registry_only() {
        let d = DuplicateDetector::default();
        let external = vec![RegisteredQuery {
            query: "remote work productivity".into(),
            hat: Hat::Red,
        }];
        assert!(d.is_duplicate("remote work productivity", &external).is_some());
        assert!(d.find_duplicate("remote work productivity").is_none());
    }

    #[test]
    fn clear_empties_registry() {
        let mut d = DuplicateDetector::default();
        d.register("a b c", Hat::White);
        assert_eq!(d.all_registered().len(), 1);
        d.clear();
        assert!(d.is_empty());
    }
}
