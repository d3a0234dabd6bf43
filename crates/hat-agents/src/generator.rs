//! `TextGenerator` backed by a rig agent on an OpenAI-compatible endpoint.

use anyhow::{Context, Result};
use async_trait::async_trait;
use hat_coordination::{ChatMessage, ChatRole, GenerationError, TextGenerator};
use rig::client::CompletionClient;
use rig::completion::{Chat, Message};
use rig::providers::openai;
use tracing::debug;

use crate::config::ModelSettings;

/// One agent is built per call: the preamble is the hat's system prompt,
/// which differs on every call.
pub struct RigGenerator {
    client: openai::CompletionsClient,
    model: String,
    temperature: f64,
    max_tokens: u64,
}

impl RigGenerator {
    pub fn from_settings(settings: &ModelSettings) -> Result<Self> {
        let client = openai::CompletionsClient::builder()
            .api_key(settings.api_key_or_placeholder())
            .base_url(&settings.base_url)
            .build()
            .with_context(|| format!("Failed to build model client for {}", settings.base_url))?;

        Ok(Self {
            client,
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn to_rig_history(history: &[ChatMessage]) -> Vec<Message> {
    history
        .iter()
        .map(|m| match m.role {
            ChatRole::User => Message::user(m.content.clone()),
            ChatRole::Assistant => Message::assistant(m.content.clone()),
        })
        .collect()
}

#[async_trait]
impl TextGenerator for RigGenerator {
    async fn generate(
        &self,
        system: &str,
        user: &str,
        history: &[ChatMessage],
    ) -> Result<String, GenerationError> {
        let agent = self
            .client
            .agent(&self.model)
            .preamble(system)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .build();

        debug!(model = %self.model, prior_turns = history.len(), "generating");

        agent
            .chat(user, to_rig_history(history))
            .await
            .map_err(|e| GenerationError::Inference(e.to_string()))
    }
}
