use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::provider::{check_status, http_client, transport_error};
use super::{ProviderClient, ProviderConfig};
use crate::error::ProviderError;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API client
pub struct AnthropicClient {
    client: Client,
    config: ProviderConfig,
}

impl AnthropicClient {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            config,
        })
    }

    fn api_key(&self) -> &str {
        self.config.api_key.as_deref().unwrap_or_default()
    }

    /// Payload fields shared by generation and token counting
    fn payload(&self, system: &str, user: &str) -> (Option<String>, Vec<Message>) {
        let system = (!system.is_empty()).then(|| system.to_string());
        let messages = vec![Message {
            role: "user".to_string(),
            content: user.to_string(),
        }];
        (system, messages)
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(format!("{}{}", self.config.base_url, path))
            .header("x-api-key", self.api_key())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error("Anthropic", e))?;

        check_status("Anthropic", response).await
    }
}

#[async_trait]
impl ProviderClient for AnthropicClient {
    fn name(&self) -> &str {
        "anthropic"
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
        let (system, messages) = self.payload(system_prompt, user_prompt);
        let request = AnthropicRequest {
            model: self.config.model.clone(),
            max_tokens: max_output_tokens,
            temperature: Some(self.config.temperature),
            system,
            messages,
        };

        let response: AnthropicResponse = self
            .post("/v1/messages", &request)
            .await?
            .json()
            .await
            .map_err(|e| {
                ProviderError::Fatal(format!("Failed to parse Anthropic API response: {}", e))
            })?;

        if let Some(usage) = &response.usage {
            debug!(
                "Anthropic usage: {} input, {} output tokens",
                usage.input_tokens, usage.output_tokens
            );
        }

        response
            .text()
            .ok_or_else(|| ProviderError::Fatal("No text content in response".to_string()))
    }

    async fn count_tokens(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<Option<usize>, ProviderError> {
        let (system, messages) = self.payload(system_prompt, user_prompt);
        let request = CountTokensRequest {
            model: self.config.model.clone(),
            system,
            messages,
        };

        let response: CountTokensResponse = self
            .post("/v1/messages/count_tokens", &request)
            .await?
            .json()
            .await
            .map_err(|e| {
                ProviderError::Fatal(format!("Failed to parse token count response: {}", e))
            })?;

        Ok(Some(response.input_tokens))
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct CountTokensRequest {
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

impl AnthropicResponse {
    /// Concatenated text of all text blocks
    fn text(&self) -> Option<String> {
        let texts: Vec<&str> = self
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .map(|c| c.text.as_str())
            .collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.join(""))
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

/// API token usage
#[derive(Debug, Clone, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct CountTokensResponse {
    input_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    use crate::llm::ProviderKind;

    fn parse_anthropic_text(body: &str) -> Result<String> {
        let response: AnthropicResponse =
            serde_json::from_str(body).context("Failed to parse Anthropic API response")?;
        response.text().context("No text content in response")
    }

    fn client() -> AnthropicClient {
        let mut config = ProviderConfig::new(ProviderKind::Anthropic);
        config.api_key = Some("test-key".to_string());
        AnthropicClient::new(config).unwrap()
    }

    #[test]
    fn test_generation_and_count_payloads_match() {
        let client = client();
        let (system, messages) = client.payload("be brief", "summarize this");

        let generate = serde_json::to_value(AnthropicRequest {
            model: "m".to_string(),
            max_tokens: 100,
            temperature: None,
            system: system.clone(),
            messages,
        })
        .unwrap();
        let (_, messages) = client.payload("be brief", "summarize this");
        let count = serde_json::to_value(CountTokensRequest {
            model: "m".to_string(),
            system,
            messages,
        })
        .unwrap();

        assert_eq!(generate["system"], count["system"]);
        assert_eq!(generate["messages"], count["messages"]);
        assert_eq!(count["messages"][0]["role"], "user");
    }

    #[test]
    fn test_parse_text_blocks() {
        let body = r#"{
            "content": [
                {"type": "text", "text": "{\"sections\": "},
                {"type": "text", "text": "{}}"}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 4}
        }"#;

        assert_eq!(parse_anthropic_text(body).unwrap(), r#"{"sections": {}}"#);
    }

    #[test]
    fn test_parse_without_text_fails() {
        let body = r#"{"content": [{"type": "tool_use"}]}"#;
        assert!(parse_anthropic_text(body).is_err());
    }
}
