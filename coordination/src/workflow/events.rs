//! Progress events emitted by `PhaseEngine::stream`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::workflow::state::{WorkflowResult, WorkflowState};
use crate::workflow::state_machine::WorkflowPhase;

/// Coarse stage label attached to every progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseTag {
    #[serde(rename = "phase_0_analysis")]
    Analysis,
    #[serde(rename = "phase_1_parallel")]
    Parallel,
    #[serde(rename = "phase_2_sequential")]
    Sequential,
    #[serde(rename = "phase_3_synthesis")]
    Synthesis,
}

impl PhaseTag {
    pub fn for_phase(phase: WorkflowPhase) -> Self {
        match phase {
            WorkflowPhase::Analyzing | WorkflowPhase::SearchingInitial => Self::Analysis,
            WorkflowPhase::ProcessingParallel => Self::Parallel,
            WorkflowPhase::Aggregating
            | WorkflowPhase::SearchingSequential
            | WorkflowPhase::ProcessingSequential => Self::Sequential,
            WorkflowPhase::Synthesizing | WorkflowPhase::Done => Self::Synthesis,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Analysis => "phase_0_analysis",
            Self::Parallel => "phase_1_parallel",
            Self::Sequential => "phase_2_sequential",
            Self::Synthesis => "phase_3_synthesis",
        }
    }
}

impl fmt::Display for PhaseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// A phase or a single hat finished. `step` names it (`query_analyzer`,
    /// `search_orchestrator`, `white_hat`, `aggregator`, ...).
    Progress {
        tag: PhaseTag,
        step: String,
        state: Box<WorkflowState>,
    },
    /// The run finished; always the last event of a successful run.
    Complete(Box<WorkflowResult>),
    /// The run aborted on a contract violation.
    Aborted { error: String },
}

impl WorkflowEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete(_) | Self::Aborted { .. })
    }
}
