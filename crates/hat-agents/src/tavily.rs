//! Tavily web search as a `SearchProvider`.

use std::time::Duration;

use async_trait::async_trait;
use hat_coordination::{ProviderError, ProviderRecord, SearchProvider};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{AppConfig, ConfigError};

/// Error bodies are cut to this many characters before they reach logs.
const ERROR_BODY_CHARS: usize = 300;

#[derive(Serialize)]
struct SearchBody<'a> {
    query: &'a str,
    max_results: usize,
    include_answer: bool,
    include_raw_content: bool,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<ProviderRecord>,
}

/// Decode a `/search` response body into raw provider records.
pub fn decode_response(body: &[u8]) -> Result<Vec<ProviderRecord>, ProviderError> {
    serde_json::from_slice::<SearchResponse>(body)
        .map(|r| r.results)
        .map_err(|e| ProviderError::Decode(e.to_string()))
}

pub struct TavilySearch {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl TavilySearch {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let key = config.search_api_key()?;
        Self::new(&config.search.base_url, key, config.workflow.lookup_timeout())
            .map_err(|e| ConfigError::Workflow(e.into()))
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    fn name(&self) -> &str {
        "tavily"
    }

    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<ProviderRecord>, ProviderError> {
        let body = SearchBody {
            query,
            max_results,
            include_answer: false,
            include_raw_content: false,
        };

        let resp = self
            .client
            .post(format!("{}/search", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.timeout)
                } else {
                    ProviderError::Transport(e.to_string())
                }
            })?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !status.is_success() {
            let body: String = String::from_utf8_lossy(&bytes)
                .chars()
                .take(ERROR_BODY_CHARS)
                .collect();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let records = decode_response(&bytes)?;
        debug!(query, results = records.len(), "tavily search");
        Ok(records)
    }
}
