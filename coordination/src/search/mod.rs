//! Lookup layer: cache, duplicate suppression, and budgeted resolution.

pub mod cache;
pub mod dedup;
pub mod orchestrator;
pub mod types;

pub use cache::{CacheStats, SearchCache};
pub use dedup::{jaccard_similarity, DuplicateDetector, DuplicateMatch, RegisteredQuery};
pub use orchestrator::{OrchestratorStats, SearchOrchestrator, SearchSession, SearchStats};
pub use types::{
    HatSearchContext, LookupMetadata, LookupRequest, LookupResult, ProviderRecord, SearchPhase,
    SearchProvider,
};
