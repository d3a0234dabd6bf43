//! Runtime for the six-hat workflow: configuration, the Tavily search
//! provider, the rig-backed generator, and terminal rendering.

pub mod config;
pub mod generator;
pub mod report;
pub mod tavily;

use std::sync::Arc;

use anyhow::{Context, Result};
use hat_coordination::PhaseEngine;

pub use config::{check_endpoint, AppConfig, ConfigError};
pub use generator::RigGenerator;
pub use tavily::TavilySearch;

/// Wire the configured provider and generator into an engine.
pub fn build_engine(config: &AppConfig) -> Result<PhaseEngine> {
    let provider = TavilySearch::from_config(config).context("Failed to set up web search")?;
    let generator = RigGenerator::from_settings(&config.model)?;
    PhaseEngine::new(config.workflow.clone(), Arc::new(provider), Arc::new(generator))
        .context("Invalid workflow configuration")
}
