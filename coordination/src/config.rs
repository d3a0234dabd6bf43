//! Workflow tuning knobs.
//!
//! `WorkflowConfig` carries every value the core needs at construction time.
//! Loading from files or the environment is the runtime crate's concern;
//! this type only knows its defaults and how to validate itself.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoordinationError;

/// Maximum provider calls per run.
pub const DEFAULT_LOOKUP_BUDGET: usize = 4;
/// Cache entry lifetime (one hour).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
/// Jaccard similarity at or above which two queries are duplicates.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;
/// Results requested from the provider per lookup.
pub const DEFAULT_MAX_RESULTS: usize = 5;
pub const DEFAULT_LOOKUP_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 90;
/// Concurrent hats in the parallel phase.
pub const DEFAULT_MAX_PARALLEL_HATS: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Global per-run budget of provider calls.
    pub lookup_budget: usize,
    pub cache_ttl_secs: u64,
    pub similarity_threshold: f64,
    pub max_results: usize,
    pub lookup_timeout_secs: u64,
    pub generation_timeout_secs: u64,
    pub max_parallel_hats: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            lookup_budget: DEFAULT_LOOKUP_BUDGET,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_results: DEFAULT_MAX_RESULTS,
            lookup_timeout_secs: DEFAULT_LOOKUP_TIMEOUT_SECS,
            generation_timeout_secs: DEFAULT_GENERATION_TIMEOUT_SECS,
            max_parallel_hats: DEFAULT_MAX_PARALLEL_HATS,
        }
    }
}

impl WorkflowConfig {
    pub fn with_budget(mut self, budget: usize) -> Self {
        self.lookup_budget = budget;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_secs = ttl.as_secs();
        self
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    /// Check that every value is usable. A zero budget is legal and disables
    /// all lookups.
    pub fn validate(&self) -> Result<(), CoordinationError> {
        if !(self.similarity_threshold > 0.0 && self.similarity_threshold <= 1.0) {
            return Err(CoordinationError::Configuration(format!(
                "similarity_threshold must be in (0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.max_results == 0 {
            return Err(CoordinationError::Configuration(
                "max_results must be at least 1".into(),
            ));
        }
        if self.max_parallel_hats == 0 {
            return Err(CoordinationError::Configuration(
                "max_parallel_hats must be at least 1".into(),
            ));
        }
        if self.cache_ttl_secs == 0 {
            return Err(CoordinationError::Configuration(
                "cache_ttl_secs must be positive".into(),
            ));
        }
        if self.lookup_timeout_secs == 0 || self.generation_timeout_secs == 0 {
            return Err(CoordinationError::Configuration(
                "timeouts must be positive".into(),
            ));
        }
        Ok(())
    }
}
