//! Four-phase, six-hat workflow.

pub mod context;
pub mod engine;
pub mod events;
pub mod generation;
pub mod state;
pub mod state_machine;

pub use context::{AggregatedContext, Evidence, SearchInsight, SynthesisContext};
pub use engine::PhaseEngine;
pub use events::{PhaseTag, WorkflowEvent};
pub use generation::{ChatMessage, ChatRole, TextGenerator};
pub use state::{ProcessingStats, WorkflowRequest, WorkflowResult, WorkflowState};
pub use state_machine::{IllegalTransition, StateMachine, TransitionRecord, WorkflowPhase};
