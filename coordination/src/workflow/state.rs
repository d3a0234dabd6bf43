//! The per-run state record and the final result.
//!
//! `WorkflowState` is passed by value from step to step. Each step writes
//! only the fields it owns:
//!
//! | Phase                | Writes                         |
//! |----------------------|--------------------------------|
//! | Analyzing            | `analysis`                     |
//! | SearchingInitial     | `initial_contexts`             |
//! | ProcessingParallel   | `parallel_outputs`             |
//! | Aggregating          | `aggregated`                   |
//! | SearchingSequential  | `sequential_context`           |
//! | ProcessingSequential | `creative_output`              |
//! | Synthesizing         | `synthesis_output`             |
//!
//! `errors` and `phases_completed` are append-only and shared by all steps.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::QueryAnalysis;
use crate::hats::Hat;
use crate::resilience::HatOutput;
use crate::search::types::HatSearchContext;
use crate::workflow::context::AggregatedContext;
use crate::workflow::generation::ChatMessage;
use crate::workflow::state_machine::{TransitionRecord, WorkflowPhase};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRequest {
    pub query: String,
    /// Prior turns forwarded to every generation call.
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

impl WorkflowRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub run_id: Uuid,
    pub query: String,
    pub history: Vec<ChatMessage>,
    pub analysis: Option<QueryAnalysis>,
    pub initial_contexts: BTreeMap<Hat, HatSearchContext>,
    pub parallel_outputs: BTreeMap<Hat, HatOutput>,
    pub aggregated: Option<AggregatedContext>,
    pub sequential_context: Option<HatSearchContext>,
    pub creative_output: Option<HatOutput>,
    pub synthesis_output: Option<HatOutput>,
    pub errors: Vec<String>,
    pub phases_completed: Vec<WorkflowPhase>,
}

impl WorkflowState {
    pub fn new(request: WorkflowRequest) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            query: request.query,
            history: request.history,
            analysis: None,
            initial_contexts: BTreeMap::new(),
            parallel_outputs: BTreeMap::new(),
            aggregated: None,
            sequential_context: None,
            creative_output: None,
            synthesis_output: None,
            errors: Vec::new(),
            phases_completed: Vec::new(),
        }
    }

    /// Lookup context the creative hat works from: its sequential lookup if
    /// one ran, else whatever the initial wave gave it.
    pub fn creative_context(&self) -> Option<&HatSearchContext> {
        self.sequential_context
            .as_ref()
            .or_else(|| self.initial_contexts.get(&Hat::CREATIVE))
    }

    /// Every hat output produced so far, keyed by hat.
    pub fn outputs(&self) -> BTreeMap<Hat, HatOutput> {
        let mut all = self.parallel_outputs.clone();
        for out in [&self.creative_output, &self.synthesis_output]
            .into_iter()
            .flatten()
        {
            all.insert(out.hat, out.clone());
        }
        all
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub lookup_budget: usize,
    /// Provider calls executed this run, failures included.
    pub lookups_executed: u32,
    pub cache_hits: u32,
    pub duplicates_prevented: u32,
    pub provider_failures: u32,
    pub budget_remaining: usize,
    /// Milliseconds spent in each completed phase.
    pub phase_timings_ms: BTreeMap<WorkflowPhase, u64>,
    pub total_elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    pub run_id: Uuid,
    pub query: String,
    /// The synthesis hat's text (or its placeholder).
    pub final_output: String,
    pub outputs: BTreeMap<Hat, HatOutput>,
    pub analysis: QueryAnalysis,
    pub aggregated: Option<AggregatedContext>,
    pub stats: ProcessingStats,
    pub errors: Vec<String>,
    /// Hats whose output is placeholder text.
    pub placeholders: Vec<Hat>,
    pub phases_completed: Vec<WorkflowPhase>,
    pub transitions: Vec<TransitionRecord>,
    pub prompt_version: String,
}

impl WorkflowResult {
    pub fn output(&self, hat: Hat) -> Option<&HatOutput> {
        self.outputs.get(&hat)
    }

    pub fn is_degraded(&self) -> bool {
        !self.errors.is_empty() || self.outputs.values().any(HatOutput::is_degraded)
    }
}
