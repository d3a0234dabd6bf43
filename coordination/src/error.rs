//! Error taxonomy for the coordination layer.
//!
//! Every failure the workflow can observe is represented here. Callers
//! classify errors with `category()` / `is_fatal()` instead of matching
//! on message text.
//!
//! ## Categories
//!
//! | Category      | Raised by                  | Run outcome                        |
//! |---------------|----------------------------|------------------------------------|
//! | Provider      | search provider call       | absent context, run continues      |
//! | Generation    | text generator call        | placeholder output, run continues  |
//! | Analysis      | query analyzer             | empty analysis, run continues      |
//! | Configuration | engine construction        | engine is not built                |
//! | Contract      | allocator, phase machine   | run aborts                         |

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::workflow::state_machine::IllegalTransition;

/// Classification used by the engine to decide between degrading and aborting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Provider,
    Generation,
    Analysis,
    Configuration,
    /// An internal guarantee was broken. Never recovered.
    Contract,
}

impl ErrorCategory {
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::Contract | Self::Configuration)
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provider => write!(f, "provider"),
            Self::Generation => write!(f, "generation"),
            Self::Analysis => write!(f, "analysis"),
            Self::Configuration => write!(f, "configuration"),
            Self::Contract => write!(f, "contract"),
        }
    }
}

/// Failure of a single external lookup. Recovered locally by the orchestrator.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode provider response: {0}")]
    Decode(String),

    /// Provider is not configured (missing key, disabled endpoint).
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// Failure of a single text-generation call. Becomes a placeholder output.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("inference failure: {0}")]
    Inference(String),

    #[error("generator returned an empty response")]
    EmptyResponse,
}

/// Unified error type for the analysis, allocation, and phase layers.
#[derive(Debug, Error)]
pub enum CoordinationError {
    // ── Recoverable ───────────────────────────────────────────────────────
    #[error("{0}")]
    Analysis(String),

    #[error("{0}")]
    Provider(#[from] ProviderError),

    #[error("{0}")]
    Generation(#[from] GenerationError),

    // ── Fatal ─────────────────────────────────────────────────────────────
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The allocator produced a list that breaks its own post-condition.
    #[error("Budget invariant violated: {0}")]
    BudgetInvariant(String),

    #[error(transparent)]
    Phase(#[from] IllegalTransition),
}

impl CoordinationError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Analysis(_) => ErrorCategory::Analysis,
            Self::Provider(_) => ErrorCategory::Provider,
            Self::Generation(_) => ErrorCategory::Generation,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::BudgetInvariant(_) | Self::Phase(_) => ErrorCategory::Contract,
        }
    }

    /// Returns `true` if the run must abort instead of degrading.
    pub fn is_fatal(&self) -> bool {
        self.category().is_fatal()
    }
}
