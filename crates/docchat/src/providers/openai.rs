//! OpenAI-compatible chat completions provider (OpenAI, Groq, ...)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::generation::ollama::{http_client, retry_with_backoff};

use super::llm::LlmProvider;

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// LLM provider speaking the `/chat/completions` protocol
pub struct OpenAiCompatibleLlm {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    name: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
}

impl OpenAiCompatibleLlm {
    /// Create a provider. The API key is read from `api_key_env` if configured.
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Result<Self> {
        let api_key = config.api_key();
        if config.api_key_env.is_some() && api_key.is_none() {
            tracing::warn!(
                "LLM provider '{}': {} is not set, requests will be unauthenticated",
                config.name,
                config.api_key_env.as_deref().unwrap_or_default()
            );
        }

        Ok(Self {
            client: http_client(timeout)?,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            name: config.name.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::generation(format!("{} request failed: {}", self.name, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::generation(format!(
                "{} failed: HTTP {} - {}",
                self.name, status, body
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            Error::generation(format!("Failed to parse {} response: {}", self.name, e))
        })?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        tracing::info!("Generating answer with {} model: {}", self.name, self.model);
        retry_with_backoff(self.max_retries, || self.call(prompt)).await
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.api_key.is_some())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }
}
