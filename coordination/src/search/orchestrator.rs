//! Budget-aware lookup resolution.
//!
//! `SearchOrchestrator` is long-lived: it owns the provider handle, the shared
//! cache, and cumulative statistics. Each workflow run opens a
//! `SearchSession`, which owns that run's duplicate registry and quota ledger.
//!
//! Resolution order for one `(hat, query)`:
//!
//! ```text
//! quota left? ── no ──► None                  (no cache / dedup interaction)
//!     │ yes
//! near-duplicate of a registered query? ── yes ──► cache[matched] or None
//!     │ no
//! cache[hat, query] valid? ── yes ──► cached context  (no quota)
//!     │ no
//! reserve one unit, register query, call provider (with timeout)
//!     ├─ ok    ──► write cache, context
//!     └─ error ──► None  (unit stays consumed)
//! ```
//!
//! All decisions above the provider call happen under one session lock, so
//! the quota can never be oversubscribed even when lookups are dispatched
//! concurrently.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::WorkflowConfig;
use crate::hats::Hat;
use crate::search::cache::{CacheStats, SearchCache};
use crate::search::dedup::{DuplicateDetector, DuplicateMatch, RegisteredQuery};
use crate::search::types::{
    HatSearchContext, LookupMetadata, LookupRequest, LookupResult, SearchPhase, SearchProvider,
};

// ── Statistics ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Resolution attempts, whatever their outcome.
    pub queries_analyzed: u32,
    /// Provider calls executed (successful or not). Never exceeds the budget.
    pub provider_calls: u32,
    pub cache_hits: u32,
    pub duplicates_prevented: u32,
    pub provider_failures: u32,
    /// Attempts skipped because the quota was spent.
    pub budget_exhausted: u32,
}

impl SearchStats {
    pub fn cache_hit_rate(&self) -> f64 {
        self.cache_hits as f64 / self.queries_analyzed.max(1) as f64
    }

    fn absorb(&mut self, other: &SearchStats) {
        self.queries_analyzed += other.queries_analyzed;
        self.provider_calls += other.provider_calls;
        self.cache_hits += other.cache_hits;
        self.duplicates_prevented += other.duplicates_prevented;
        self.provider_failures += other.provider_failures;
        self.budget_exhausted += other.budget_exhausted;
    }
}

/// Cumulative view across all finished sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorStats {
    pub totals: SearchStats,
    pub cache_hit_rate: f64,
    pub cache: CacheStats,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// ── SearchOrchestrator ────────────────────────────────────────────────────────

pub struct SearchOrchestrator {
    provider: Arc<dyn SearchProvider>,
    cache: SearchCache,
    budget: usize,
    similarity_threshold: f64,
    max_results: usize,
    lookup_timeout: Duration,
    totals: Mutex<SearchStats>,
}

impl SearchOrchestrator {
    pub fn new(provider: Arc<dyn SearchProvider>, config: &WorkflowConfig) -> Self {
        Self {
            provider,
            cache: SearchCache::new(config.cache_ttl()),
            budget: config.lookup_budget,
            similarity_threshold: config.similarity_threshold,
            max_results: config.max_results,
            lookup_timeout: config.lookup_timeout(),
            totals: Mutex::new(SearchStats::default()),
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn cache(&self) -> &SearchCache {
        &self.cache
    }

    /// Open a session with a fresh duplicate registry and a full quota.
    pub fn session(self: &Arc<Self>) -> SearchSession {
        SearchSession {
            orchestrator: Arc::clone(self),
            state: Mutex::new(SessionState {
                detector: DuplicateDetector::new(self.similarity_threshold),
                used: 0,
                stats: SearchStats::default(),
            }),
        }
    }

    pub fn statistics(&self) -> OrchestratorStats {
        let totals = *lock(&self.totals);
        OrchestratorStats {
            totals,
            cache_hit_rate: totals.cache_hit_rate(),
            cache: self.cache.stats(),
        }
    }

    pub fn reset_statistics(&self) {
        *lock(&self.totals) = SearchStats::default();
    }
}

// ── SearchSession ─────────────────────────────────────────────────────────────

struct SessionState {
    detector: DuplicateDetector,
    /// Provider calls reserved so far.
    used: usize,
    stats: SearchStats,
}

/// Outcome of the in-memory part of resolution.
enum Plan {
    Exhausted,
    Duplicate(DuplicateMatch),
    Cached(Vec<LookupResult>),
    /// One unit of quota has been reserved for this lookup.
    Dispatch,
}

pub struct SearchSession {
    orchestrator: Arc<SearchOrchestrator>,
    state: Mutex<SessionState>,
}

impl SearchSession {
    pub fn remaining_budget(&self) -> usize {
        let state = lock(&self.state);
        self.orchestrator.budget.saturating_sub(state.used)
    }

    pub fn budget_used(&self) -> usize {
        lock(&self.state).used
    }

    pub fn stats(&self) -> SearchStats {
        lock(&self.state).stats
    }

    pub fn registered_queries(&self) -> Vec<RegisteredQuery> {
        lock(&self.state).detector.all_registered().to_vec()
    }

    /// Resolve one lookup.
    pub async fn resolve(
        &self,
        hat: Hat,
        query: &str,
        phase: SearchPhase,
    ) -> Option<HatSearchContext> {
        match self.plan(hat, query) {
            Plan::Exhausted => None,
            Plan::Duplicate(matched) => self.serve_duplicate(hat, query, &matched, phase),
            Plan::Cached(results) => Some(cached_context(hat, query, results, phase)),
            Plan::Dispatch => self.dispatch(hat, query, phase).await,
        }
    }

    /// Resolve a whole wave of requests.
    ///
    /// Requests are planned one by one in the given order, so quota goes to
    /// the earliest (highest-priority) requests. Provider calls then run
    /// concurrently. Requests that duplicate another request of the same
    /// wave are served last, once the cache has been filled.
    pub async fn resolve_wave(&self, requests: &[LookupRequest]) -> BTreeMap<Hat, HatSearchContext> {
        let mut contexts = BTreeMap::new();
        let mut dispatches = Vec::new();
        let mut deferred = Vec::new();

        for request in requests {
            match self.plan(request.hat, &request.query) {
                Plan::Exhausted => {}
                Plan::Cached(results) => {
                    contexts.insert(
                        request.hat,
                        cached_context(request.hat, &request.query, results, SearchPhase::Initial),
                    );
                }
                Plan::Duplicate(matched) => deferred.push((request, matched)),
                Plan::Dispatch => dispatches.push(request),
            }
        }

        debug!(
            dispatched = dispatches.len(),
            cached = contexts.len(),
            deferred = deferred.len(),
            "lookup wave planned"
        );

        let calls = dispatches
            .iter()
            .map(|r| self.dispatch(r.hat, &r.query, SearchPhase::Initial));
        for ctx in join_all(calls).await.into_iter().flatten() {
            contexts.insert(ctx.hat, ctx);
        }

        for (request, matched) in deferred {
            if let Some(ctx) =
                self.serve_duplicate(request.hat, &request.query, &matched, SearchPhase::Initial)
            {
                contexts.insert(request.hat, ctx);
            }
        }

        contexts
    }

    /// Fold this session's counters into the orchestrator totals.
    pub fn finish(self) -> SearchStats {
        let stats = lock(&self.state).stats;
        lock(&self.orchestrator.totals).absorb(&stats);
        stats
    }

    fn plan(&self, hat: Hat, query: &str) -> Plan {
        let mut state = lock(&self.state);
        state.stats.queries_analyzed += 1;

        if state.used >= self.orchestrator.budget {
            state.stats.budget_exhausted += 1;
            debug!(hat = %hat, "lookup budget exhausted");
            return Plan::Exhausted;
        }

        if let Some(matched) = state.detector.find_duplicate(query) {
            state.stats.duplicates_prevented += 1;
            debug!(
                hat = %hat,
                duplicate_of = %matched.query,
                source = %matched.hat,
                similarity = matched.similarity,
                "near-duplicate lookup suppressed"
            );
            return Plan::Duplicate(matched);
        }

        if let Some(results) = self.orchestrator.cache.get(hat, query) {
            state.stats.cache_hits += 1;
            debug!(hat = %hat, results = results.len(), "lookup served from cache");
            return Plan::Cached(results);
        }

        state.used += 1;
        state.stats.provider_calls += 1;
        state.detector.register(query, hat);
        Plan::Dispatch
    }

    fn serve_duplicate(
        &self,
        hat: Hat,
        query: &str,
        matched: &DuplicateMatch,
        phase: SearchPhase,
    ) -> Option<HatSearchContext> {
        let Some(results) = self.orchestrator.cache.get(matched.hat, &matched.query) else {
            debug!(hat = %hat, source = %matched.hat, "duplicate source has no cached results");
            return None;
        };
        let mut ctx = cached_context(hat, query, results, phase);
        ctx.metadata.duplicate_of = Some(matched.query.clone());
        ctx.metadata.duplicate_source = Some(matched.hat);
        Some(ctx)
    }

    async fn dispatch(&self, hat: Hat, query: &str, phase: SearchPhase) -> Option<HatSearchContext> {
        let orch = &self.orchestrator;
        let start = Instant::now();

        let outcome =
            tokio::time::timeout(orch.lookup_timeout, orch.provider.search(query, orch.max_results))
                .await;

        let records = match outcome {
            Ok(Ok(records)) => records,
            Ok(Err(e)) => {
                warn!(hat = %hat, provider = orch.provider.name(), error = %e, "lookup failed");
                lock(&self.state).stats.provider_failures += 1;
                return None;
            }
            Err(_) => {
                warn!(
                    hat = %hat,
                    provider = orch.provider.name(),
                    timeout_secs = orch.lookup_timeout.as_secs(),
                    "lookup timed out"
                );
                lock(&self.state).stats.provider_failures += 1;
                return None;
            }
        };

        let results: Vec<LookupResult> = records
            .into_iter()
            .take(orch.max_results)
            .map(LookupResult::from)
            .collect();
        orch.cache.set(hat, query, results.clone());

        let elapsed = start.elapsed();
        info!(
            hat = %hat,
            results = results.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "lookup completed"
        );

        Some(HatSearchContext {
            hat,
            query: query.to_string(),
            metadata: LookupMetadata {
                phase,
                query_length: query.len(),
                result_count: results.len(),
                duplicate_of: None,
                duplicate_source: None,
            },
            results,
            cache_hit: false,
            elapsed,
        })
    }
}

fn cached_context(
    hat: Hat,
    query: &str,
    results: Vec<LookupResult>,
    phase: SearchPhase,
) -> HatSearchContext {
    HatSearchContext {
        hat,
        query: query.to_string(),
        metadata: LookupMetadata {
            phase,
            query_length: query.len(),
            result_count: results.len(),
            duplicate_of: None,
            duplicate_source: None,
        },
        results,
        cache_hit: true,
        elapsed: Duration::ZERO,
    }
}
