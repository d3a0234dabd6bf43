//! Shared lookup types and the provider seam.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::analysis::SearchPriority;
use crate::error::ProviderError;
use crate::hats::Hat;

/// External search backend. One call per lookup; retries are not the
/// provider's job.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str {
        "search"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<ProviderRecord>, ProviderError>;
}

/// A record exactly as the provider returned it. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderRecord {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
}

/// One normalized result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupResult {
    pub title: String,
    pub url: String,
    pub content: String,
    /// Provider relevance, clamped to `[0, 1]`.
    pub score: f64,
}

impl From<ProviderRecord> for LookupResult {
    fn from(record: ProviderRecord) -> Self {
        let score = record.score.filter(|s| s.is_finite()).unwrap_or(0.0);
        Self {
            title: record.title.unwrap_or_default(),
            url: record.url.unwrap_or_default(),
            content: record.content.unwrap_or_default(),
            score: score.clamp(0.0, 1.0),
        }
    }
}

/// A hat's request to search, in allocation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupRequest {
    pub hat: Hat,
    pub query: String,
    pub priority: SearchPriority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPhase {
    Initial,
    Sequential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupMetadata {
    pub phase: SearchPhase,
    pub query_length: usize,
    pub result_count: usize,
    /// Registered query this lookup was served from, if it was a near-duplicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_source: Option<Hat>,
}

/// Results of one hat's lookup together with how they were obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HatSearchContext {
    pub hat: Hat,
    pub query: String,
    pub results: Vec<LookupResult>,
    /// Served from cache (directly or through a duplicate). No quota used.
    pub cache_hit: bool,
    /// Zero for cache and duplicate hits.
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
    pub metadata: LookupMetadata,
}

impl HatSearchContext {
    pub fn is_duplicate(&self) -> bool {
        self.metadata.duplicate_of.is_some()
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
