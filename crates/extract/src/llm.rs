use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::prompt;

/// A single prompt for the language model.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    /// Overrides the client's default model
    pub model: Option<String>,
    pub temperature: f32,
    /// Ask the backend to constrain output to JSON
    pub json: bool,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            model: None,
            temperature: 0.0,
            json: true,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// The LLM call wrapper. A failed or empty completion is `None`; callers
/// treat that as "unavailable" and never block on it.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Option<String>;
}

#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    system: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>, // "json" for structured output
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(base_url: String, model: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url,
            model,
            client,
        }
    }

    pub fn default() -> Self {
        Self::new(
            "http://localhost:11434".to_string(),
            "llama3".to_string(),
            Duration::from_secs(60),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn generate(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let body = OllamaRequest {
            model: request.model.clone().unwrap_or_else(|| self.model.clone()),
            prompt: request.user_prompt.clone(),
            system: request.system_prompt.clone(),
            stream: false,
            format: request.json.then(|| "json".to_string()),
            options: OllamaOptions {
                temperature: request.temperature,
            },
        };

        let response = self.client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to Ollama")?;

        if !response.status().is_success() {
            anyhow::bail!("Ollama request failed: {}", response.status());
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        Ok(ollama_response.response)
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn complete(&self, request: &CompletionRequest) -> Option<String> {
        match self.generate(request).await {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => {
                debug!(model = %self.model, "Empty completion");
                None
            }
            Err(e) => {
                warn!(model = %self.model, error = %e, "LLM call failed");
                None
            }
        }
    }
}

/// Pull the JSON document out of a completion that may be wrapped in
/// markdown fences or surrounded by chatter.
pub fn extract_json(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let start = trimmed.find(['{', '['])?;
    let close = if trimmed[start..].starts_with('{') { '}' } else { ']' };
    let end = trimmed.rfind(close)?;
    (end > start).then(|| &trimmed[start..=end])
}

/// Complete and return a parsed JSON value, re-prompting with a repair
/// request when the model produced invalid JSON.
pub async fn complete_json(
    llm: &dyn LanguageModel,
    request: &CompletionRequest,
    max_retries: usize,
) -> Option<serde_json::Value> {
    let mut response = llm.complete(request).await?;

    for attempt in 0..max_retries.max(1) {
        if let Some(value) = extract_json(&response).and_then(|s| serde_json::from_str(s).ok()) {
            return Some(value);
        }
        if attempt + 1 == max_retries.max(1) {
            break;
        }

        debug!(attempt = attempt + 1, "Invalid JSON from LLM, asking for repair");
        let retry = CompletionRequest {
            user_prompt: prompt::build_retry_prompt(&response),
            ..request.clone()
        };
        response = llm.complete(&retry).await?;
    }

    warn!(max_retries, "Failed to get valid JSON from LLM");
    None
}
