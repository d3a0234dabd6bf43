//! Runtime configuration.
//!
//! Layering, lowest precedence first:
//!
//! | Layer       | Source                                                  |
//! |-------------|---------------------------------------------------------|
//! | defaults    | `DEFAULT_*` constants and `WorkflowConfig::default()`   |
//! | file        | optional TOML document (`--config`)                     |
//! | environment | `HATS_*`, `TAVILY_API_KEY`, `OPENAI_API_KEY`            |
//! | CLI         | flags applied by the binary after loading               |
//!
//! ```toml
//! [workflow]
//! lookup_budget = 4
//! similarity_threshold = 0.8
//!
//! [model]
//! base_url = "https://api.openai.com/v1"
//! model = "gpt-4o-mini"
//!
//! [search]
//! base_url = "https://api.tavily.com"
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;

use hat_coordination::{CoordinationError, WorkflowConfig};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MODEL_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_SEARCH_URL: &str = "https://api.tavily.com";
pub const DEFAULT_TEMPERATURE: f64 = 0.0;
pub const DEFAULT_MAX_TOKENS: u64 = 2_000;

/// Sent when the model endpoint needs no key (local OpenAI-compatible servers).
const NO_API_KEY: &str = "not-needed";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("{0} is not set")]
    Missing(&'static str),

    #[error(transparent)]
    Workflow(#[from] CoordinationError),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// OpenAI-compatible base URL, including the `/v1` suffix.
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f64,
    pub max_tokens: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_MODEL_URL.into(),
            model: DEFAULT_MODEL.into(),
            api_key: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl ModelSettings {
    pub fn api_key_or_placeholder(&self) -> &str {
        self.api_key.as_deref().unwrap_or(NO_API_KEY)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SEARCH_URL.into(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub workflow: WorkflowConfig,
    pub model: ModelSettings,
    pub search: SearchSettings,
}

impl AppConfig {
    /// Load from the optional file and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Load with an explicit environment lookup.
    pub fn load_with<F>(path: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(&env)?;
        config.workflow.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env(&mut self, env: &dyn Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        // ── Model ──
        if let Some(v) = var(env, "HATS_MODEL") {
            self.model.model = v;
        }
        if let Some(v) = var(env, "HATS_MODEL_URL") {
            self.model.base_url = v;
        }
        if let Some(v) = var(env, "OPENAI_API_KEY") {
            self.model.api_key = Some(v);
        }
        if let Some(v) = var(env, "HATS_MODEL_API_KEY") {
            self.model.api_key = Some(v);
        }
        if let Some(v) = parsed(env, "HATS_TEMPERATURE")? {
            self.model.temperature = v;
        }
        if let Some(v) = parsed(env, "HATS_MAX_TOKENS")? {
            self.model.max_tokens = v;
        }

        // ── Search ──
        if let Some(v) = var(env, "HATS_SEARCH_URL") {
            self.search.base_url = v;
        }
        if let Some(v) = var(env, "TAVILY_API_KEY") {
            self.search.api_key = Some(v);
        }

        // ── Workflow ──
        let wf = &mut self.workflow;
        if let Some(v) = parsed(env, "HATS_LOOKUP_BUDGET")? {
            wf.lookup_budget = v;
        }
        if let Some(v) = parsed(env, "HATS_CACHE_TTL_SECS")? {
            wf.cache_ttl_secs = v;
        }
        if let Some(v) = parsed(env, "HATS_SIMILARITY_THRESHOLD")? {
            wf.similarity_threshold = v;
        }
        if let Some(v) = parsed(env, "HATS_MAX_RESULTS")? {
            wf.max_results = v;
        }
        if let Some(v) = parsed(env, "HATS_LOOKUP_TIMEOUT_SECS")? {
            wf.lookup_timeout_secs = v;
        }
        if let Some(v) = parsed(env, "HATS_GENERATION_TIMEOUT_SECS")? {
            wf.generation_timeout_secs = v;
        }
        if let Some(v) = parsed(env, "HATS_MAX_PARALLEL")? {
            wf.max_parallel_hats = v;
        }
        Ok(())
    }

    /// The search key is mandatory; the workflow cannot look anything up
    /// without it.
    pub fn search_api_key(&self) -> Result<&str, ConfigError> {
        self.search
            .api_key
            .as_deref()
            .ok_or(ConfigError::Missing("TAVILY_API_KEY"))
    }
}

fn var(env: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    env(key).filter(|v| !v.trim().is_empty())
}

fn parsed<T: FromStr>(
    env: &dyn Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    var(env, key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { key, value: raw.clone() })
        })
        .transpose()
}

/// Check if an OpenAI-compatible endpoint is reachable (GET `{url}/models`).
pub async fn check_endpoint(url: &str) -> bool {
    let models_url = format!("{}/models", url.trim_end_matches('/'));
    match reqwest::Client::new()
        .get(&models_url)
        .timeout(std::time::Duration::from_secs(5))
        .send()
        .await
    {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}
