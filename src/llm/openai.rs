use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::provider::{check_status, http_client, transport_error};
use super::{ProviderClient, ProviderConfig};
use crate::error::ProviderError;

/// Client for OpenAI-compatible chat completion APIs (OpenAI, Ollama)
///
/// These APIs expose no token-count endpoint, so preflight falls back to the
/// local tokenizer.
pub struct OpenAiClient {
    client: Client,
    config: ProviderConfig,
}

impl OpenAiClient {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            config,
        })
    }

    fn messages(system: &str, user: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: user.to_string(),
        });
        messages
    }
}

#[async_trait]
impl ProviderClient for OpenAiClient {
    fn name(&self) -> &str {
        self.config.kind.label()
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn summarize(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_output_tokens: usize,
    ) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: Self::messages(system_prompt, user_prompt),
            max_tokens: max_output_tokens,
            temperature: self.config.temperature,
        };

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let provider = self.name().to_string();
        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(&provider, e))?;
        let response: ChatResponse = check_status(&provider, response)
            .await?
            .json()
            .await
            .map_err(|e| {
                ProviderError::Fatal(format!("Failed to parse {} API response: {}", provider, e))
            })?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| ProviderError::Fatal("No text content in response".to_string()))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    temperature: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}
