//! Language-model collaborator: one prompt in, one text reply out.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use researcher_shared::{LlmConfig, ResearcherError, Result, read_api_key};

use crate::USER_AGENT;

/// Which pipeline call a prompt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    PlanQueries,
    Analyze,
    ExtractFindings,
    WriteAnswer,
}

impl PromptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlanQueries => "plan_queries",
            Self::Analyze => "analyze",
            Self::ExtractFindings => "extract_findings",
            Self::WriteAnswer => "write_answer",
        }
    }
}

/// A single model request.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub kind: PromptKind,
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

/// Anything that can turn a prompt into text.
///
/// Failures surface as [`ResearcherError::Model`] (or `Network`/`Parse`);
/// callers treat every error as fallback-eligible and never retry.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn invoke(&self, prompt: &Prompt) -> Result<String>;
}

// ---------------------------------------------------------------------------
// OpenAI-compatible chat completions
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponseRaw {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client for OpenAI and compatible endpoints.
#[derive(Clone)]
pub struct OpenAiChatModel {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiChatModel {
    /// Create a client against the public OpenAI API.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ResearcherError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
        })
    }

    /// Build from the `[llm]` config section, reading the key from its env var.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = read_api_key(&config.api_key_env).ok_or_else(|| {
            ResearcherError::config(format!(
                "language-model API key not found. Set the {} environment variable.",
                config.api_key_env
            ))
        })?;

        Ok(Self::new(
            api_key,
            &config.model,
            Duration::from_secs(config.request_timeout_secs),
        )?
        .with_base_url(&config.base_url))
    }

    /// Set a custom base URL (for proxies, Azure, local servers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    #[instrument(skip_all, fields(kind = prompt.kind.as_str(), model = %self.model))]
    async fn invoke(&self, prompt: &Prompt) -> Result<String> {
        let start = Instant::now();

        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: prompt.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "model request failed");
                ResearcherError::Network(format!("chat completion request: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "model API error");
            let snippet: String = body.chars().take(200).collect();
            return Err(ResearcherError::Model(format!("HTTP {status}: {snippet}")));
        }

        let raw: ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| ResearcherError::parse(format!("chat completion body: {e}")))?;

        let content = raw
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ResearcherError::Model("no content in model response".into()))?;

        debug!(
            elapsed_ms = start.elapsed().as_millis(),
            chars = content.len(),
            "model call complete"
        );

        Ok(content)
    }
}
