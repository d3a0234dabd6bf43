//! Six Thinking Hats coordination library
//!
//! Runs a user query through six role-specialized perspectives in four phases
//! with a shared, budgeted web-lookup layer:
//!
//! - **Analysis**: classify the query and allocate at most `B` lookups to hats
//! - **Parallel**: White, Red, Yellow and Black answer concurrently
//! - **Sequential**: Green builds on the aggregated parallel outputs
//! - **Synthesis**: Blue integrates every perspective into the final answer
//!
//! The lookup layer caches results per hat, suppresses near-duplicate queries
//! (Jaccard word similarity) and never lets a run exceed its quota.
//!
//! # Usage
//!
//! ```ignore
//! let engine = PhaseEngine::new(WorkflowConfig::default(), provider, generator)?;
//! let result = engine.run("Should I start a business?").await?;
//! println!("{}", result.final_output);
//! ```
//!
//! Model and search backends are traits ([`TextGenerator`], [`SearchProvider`]);
//! concrete adapters live in the `hat-agents` crate.

pub mod analysis;
pub mod config;
pub mod error;
pub mod hats;
pub mod prompts;
pub mod resilience;
pub mod search;
pub mod workflow;

pub use analysis::{
    BudgetAllocator, Complexity, QueryAnalysis, QueryAnalyzer, QueryType, SearchPriority, Topic,
};
pub use config::WorkflowConfig;
pub use error::{CoordinationError, ErrorCategory, GenerationError, ProviderError};
pub use hats::Hat;
pub use resilience::{DegradationLevel, HatOutput};
pub use search::{
    HatSearchContext, LookupRequest, LookupResult, ProviderRecord, SearchOrchestrator,
    SearchPhase, SearchProvider, SearchSession, SearchStats,
};
pub use workflow::{
    ChatMessage, ChatRole, PhaseEngine, ProcessingStats, TextGenerator, WorkflowEvent,
    WorkflowPhase, WorkflowRequest, WorkflowResult,
};
