//! Workflow state machine: explicit phases and legal transition guards.
//!
//! Every run starts at `Analyzing` and ends at `Done`. The engine calls
//! `advance()` between phases; each call validates the edge and appends it
//! to the transition log, from which per-phase timings are derived.
//!
//! ```text
//! Analyzing → SearchingInitial → ProcessingParallel → Aggregating
//! Aggregating → SearchingSequential → ProcessingSequential
//! Aggregating → ProcessingSequential            (sequential lookup skipped)
//! ProcessingSequential → Synthesizing → Done
//! ```
//!
//! The graph is acyclic, so no phase is ever revisited.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    /// Classify the query and allocate the lookup budget.
    Analyzing,
    /// Resolve lookups for every allocated hat.
    SearchingInitial,
    /// Run the four parallel hats concurrently.
    ProcessingParallel,
    /// Combine parallel outputs and evidence.
    Aggregating,
    /// Optional lookup for the creative hat.
    SearchingSequential,
    /// Run the creative hat.
    ProcessingSequential,
    /// Run the synthesis hat.
    Synthesizing,
    /// Terminal.
    Done,
}

impl WorkflowPhase {
    pub fn is_terminal(self) -> bool {
        self == Self::Done
    }
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Analyzing => write!(f, "Analyzing"),
            Self::SearchingInitial => write!(f, "SearchingInitial"),
            Self::ProcessingParallel => write!(f, "ProcessingParallel"),
            Self::Aggregating => write!(f, "Aggregating"),
            Self::SearchingSequential => write!(f, "SearchingSequential"),
            Self::ProcessingSequential => write!(f, "ProcessingSequential"),
            Self::Synthesizing => write!(f, "Synthesizing"),
            Self::Done => write!(f, "Done"),
        }
    }
}

fn is_legal_transition(from: WorkflowPhase, to: WorkflowPhase) -> bool {
    use WorkflowPhase::*;

    matches!(
        (from, to),
        (Analyzing, SearchingInitial)
            | (SearchingInitial, ProcessingParallel)
            | (ProcessingParallel, Aggregating)
            | (Aggregating, SearchingSequential)
            | (Aggregating, ProcessingSequential)
            | (SearchingSequential, ProcessingSequential)
            | (ProcessingSequential, Synthesizing)
            | (Synthesizing, Done)
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: WorkflowPhase,
    pub to: WorkflowPhase,
    /// Milliseconds since the state machine was created.
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Error)]
#[error("Illegal phase transition: {from} → {to}")]
pub struct IllegalTransition {
    pub from: WorkflowPhase,
    pub to: WorkflowPhase,
}

pub struct StateMachine {
    current: WorkflowPhase,
    created_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current: WorkflowPhase::Analyzing,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> WorkflowPhase {
        self.current
    }

    /// Move to `to` if the edge exists, recording it in the log.
    pub fn advance(
        &mut self,
        to: WorkflowPhase,
        reason: Option<&str>,
    ) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalTransition {
                from: self.current,
                to,
            });
        }

        let record = TransitionRecord {
            from: self.current,
            to,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
            reason: reason.map(String::from),
        };

        tracing::debug!(from = %self.current, to = %to, "Phase transition");

        self.transitions.push(record);
        self.current = to;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// Phases left so far, in order.
    pub fn completed(&self) -> Vec<WorkflowPhase> {
        self.transitions.iter().map(|t| t.from).collect()
    }

    /// Time spent in each completed phase, from consecutive log entries.
    pub fn phase_durations(&self) -> BTreeMap<WorkflowPhase, u64> {
        let mut durations = BTreeMap::new();
        let mut entered_at = 0u64;
        for t in &self.transitions {
            durations.insert(t.from, t.elapsed_ms.saturating_sub(entered_at));
            entered_at = t.elapsed_ms;
        }
        durations
    }

    pub fn summary(&self) -> String {
        let states: Vec<String> = self.transitions.iter().map(|t| t.to.to_string()).collect();
        let mut text = format!(
            "{} → {} ({}ms, {} transitions)",
            WorkflowPhase::Analyzing,
            self.current,
            self.created_at.elapsed().as_millis(),
            self.transitions.len(),
        );
        if !states.is_empty() {
            text.push_str(&format!(" [{}]", states.join(" → ")));
        }
        text
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
