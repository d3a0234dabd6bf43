//! Query analysis and lookup budget allocation.

pub mod allocator;
pub mod analyzer;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hats::Hat;
use crate::search::types::LookupRequest;

pub use allocator::BudgetAllocator;
pub use analyzer::QueryAnalyzer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple => write!(f, "simple"),
            Self::Moderate => write!(f, "moderate"),
            Self::Complex => write!(f, "complex"),
        }
    }
}

/// Subject-matter category. Declaration order is the tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Business,
    Health,
    Technology,
    Emotional,
    Social,
    Safety,
    General,
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Business => write!(f, "business"),
            Self::Health => write!(f, "health"),
            Self::Technology => write!(f, "technology"),
            Self::Emotional => write!(f, "emotional"),
            Self::Social => write!(f, "social"),
            Self::Safety => write!(f, "safety"),
            Self::General => write!(f, "general"),
        }
    }
}

/// Intent of the question, independent of its topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Recommendation,
    Informational,
    Comparative,
    Analytical,
    General,
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recommendation => write!(f, "recommendation"),
            Self::Informational => write!(f, "informational"),
            Self::Comparative => write!(f, "comparative"),
            Self::Analytical => write!(f, "analytical"),
            Self::General => write!(f, "general"),
        }
    }
}

/// How badly a hat needs a lookup. Declaration order is rank: `Critical`
/// sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPriority {
    Critical,
    High,
    Medium,
    Low,
    Never,
}

impl SearchPriority {
    /// Tiers that may receive quota.
    pub fn is_eligible(self) -> bool {
        matches!(self, Self::Critical | Self::High | Self::Medium)
    }
}

impl fmt::Display for SearchPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
            Self::Never => write!(f, "never"),
        }
    }
}

/// Everything the analyzer decided about one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub query: String,
    pub complexity: Complexity,
    pub topic: Topic,
    pub query_type: QueryType,
    pub priorities: BTreeMap<Hat, SearchPriority>,
    /// Tailored lookup string per hat.
    pub queries: BTreeMap<Hat, String>,
    /// Hats allowed to search, in priority order. At most the budget.
    pub allocation: Vec<Hat>,
    pub rationale: String,
}

impl QueryAnalysis {
    /// Analysis used when classification failed: no priorities, no lookups.
    pub fn empty(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            complexity: Complexity::Simple,
            topic: Topic::General,
            query_type: QueryType::General,
            priorities: BTreeMap::new(),
            queries: BTreeMap::new(),
            allocation: Vec::new(),
            rationale: "Query analysis unavailable; no lookups allocated.".into(),
        }
    }

    /// Priority of `hat`; hats absent from the map never search.
    pub fn priority(&self, hat: Hat) -> SearchPriority {
        self.priorities
            .get(&hat)
            .copied()
            .unwrap_or(SearchPriority::Never)
    }

    pub fn query_for(&self, hat: Hat) -> Option<&str> {
        self.queries.get(&hat).map(String::as_str)
    }

    pub fn is_allocated(&self, hat: Hat) -> bool {
        self.allocation.contains(&hat)
    }

    /// Lookup requests for the first wave, in allocation order. The
    /// synthesis hat never searches even when allocated.
    pub fn initial_requests(&self) -> Vec<LookupRequest> {
        self.allocation
            .iter()
            .filter(|&&hat| hat != Hat::SYNTHESIS)
            .filter_map(|&hat| {
                self.query_for(hat).map(|q| LookupRequest {
                    hat,
                    query: q.to_string(),
                    priority: self.priority(hat),
                })
            })
            .collect()
    }
}
