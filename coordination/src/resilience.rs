//! Degraded hat outputs.
//!
//! A hat never fails the run. Its output is wrapped with a degradation level
//! so the synthesis step and the caller can tell real perspectives from
//! fallbacks.
//!
//! ```text
//! generation ok, evidence as allocated     → HatOutput { level: Full }
//! generation ok, allocated lookup missing  → HatOutput { level: Partial, warnings }
//! generation failed / timed out / panicked → HatOutput { level: Unavailable } (placeholder)
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hats::Hat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationLevel {
    Full,
    /// Produced without the lookup evidence it was allocated.
    Partial,
    /// Placeholder text; the hat produced nothing.
    Unavailable,
}

impl std::fmt::Display for DegradationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Partial => write!(f, "partial"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HatOutput {
    pub hat: Hat,
    pub text: String,
    pub level: DegradationLevel,
    /// Whether lookup evidence was included in the prompt.
    pub search_used: bool,
    pub elapsed_ms: u64,
    pub warnings: Vec<String>,
    pub produced_at: DateTime<Utc>,
}

impl HatOutput {
    pub fn full(hat: Hat, text: String, search_used: bool, elapsed: Duration) -> Self {
        Self {
            hat,
            text,
            level: DegradationLevel::Full,
            search_used,
            elapsed_ms: elapsed.as_millis() as u64,
            warnings: Vec::new(),
            produced_at: Utc::now(),
        }
    }

    pub fn partial(hat: Hat, text: String, elapsed: Duration, warning: &str) -> Self {
        Self {
            level: DegradationLevel::Partial,
            warnings: vec![warning.to_string()],
            ..Self::full(hat, text, false, elapsed)
        }
    }

    pub fn placeholder(hat: Hat, error: &str, elapsed: Duration) -> Self {
        Self {
            hat,
            text: hat.placeholder_text(),
            level: DegradationLevel::Unavailable,
            search_used: false,
            elapsed_ms: elapsed.as_millis() as u64,
            warnings: vec![error.to_string()],
            produced_at: Utc::now(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.level == DegradationLevel::Unavailable
    }

    pub fn is_degraded(&self) -> bool {
        self.level != DegradationLevel::Full
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_output_is_not_degraded() {
        let out = HatOutput::full(Hat::White, "facts".into(), true, Duration::from_millis(12));
        assert!(!out.is_degraded());
        assert_eq!(out.elapsed_ms, 12);
    }

    #[test]
    fn partial_output_keeps_text_and_warning() {
        let out = HatOutput::partial(Hat::Red, "gut feel".into(), Duration::ZERO, "no evidence");
        assert!(out.is_degraded());
        assert!(!out.is_placeholder());
        assert_eq!(out.text, "gut feel");
        assert_eq!(out.warnings, vec!["no evidence".to_string()]);
    }

    #[test]
    fn placeholder_uses_fixed_text() {
        let out = HatOutput::placeholder(Hat::Blue, "timeout", Duration::ZERO);
        assert!(out.is_placeholder());
        assert_eq!(out.text, "Error: Unable to process Blue Hat (Process) perspective.");
    }

    #[test]
    fn level_ordering_tracks_severity() {
        assert!(DegradationLevel::Full < DegradationLevel::Partial);
        assert!(DegradationLevel::Partial < DegradationLevel::Unavailable);
    }
}
