use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Response, StatusCode};

use super::{AnthropicClient, OpenAiClient, RetryPolicy, RetryingProvider};
use crate::error::ProviderError;

/// A text-generation backend: one call in, one text out.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Provider name used in logs and summary metadata
    fn name(&self) -> &str;

    /// Model identifier sent with every request
    fn model(&self) -> &str;

    /// Run one generation call
    async fn summarize(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_output_tokens: usize,
    ) -> Result<String, ProviderError>;

    /// Authoritative input-token count for the exact payload `summarize` would send.
    ///
    /// `None` means the provider has no count endpoint and a local estimate is used.
    async fn count_tokens(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
    ) -> Result<Option<usize>, ProviderError> {
        Ok(None)
    }
}

/// Supported provider backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
    /// Local Ollama server through its OpenAI-compatible API
    Ollama,
}

impl ProviderKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }

    fn default_model(self) -> &'static str {
        match self {
            Self::Anthropic => "claude-sonnet-4-20250514",
            Self::OpenAi => "gpt-4o-mini",
            Self::Ollama => "llama3.1",
        }
    }

    fn default_base_url(self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Ollama => "http://localhost:11434/v1",
        }
    }

    fn api_key_var(self) -> Option<&'static str> {
        match self {
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Ollama => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" | "open-ai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(format!(
                "unknown provider '{}' (expected anthropic, openai or ollama)",
                other
            )),
        }
    }
}

/// Connection settings for a provider
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// API key; not needed for Ollama
    pub api_key: Option<String>,
    /// Model to use (e.g., "claude-sonnet-4-20250514")
    pub model: String,
    /// API root without a trailing slash
    pub base_url: String,
    /// Temperature (0-1, lower = more deterministic)
    pub temperature: f64,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Retries for transient errors (0 disables the retry layer)
    pub max_retries: u32,
}

impl ProviderConfig {
    /// Defaults for a provider kind, without credentials
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            api_key: None,
            model: kind.default_model().to_string(),
            base_url: kind.default_base_url().to_string(),
            temperature: 0.2,
            timeout_secs: 120,
            max_retries: 3,
        }
    }

    /// Create config from environment variables.
    ///
    /// Reads the provider's API key variable plus optional `RECAP_MODEL`
    /// and `RECAP_BASE_URL` overrides.
    pub fn from_env(kind: ProviderKind) -> Result<Self> {
        let mut config = Self::new(kind);

        if let Some(var) = kind.api_key_var() {
            let key = std::env::var(var)
                .with_context(|| format!("{} environment variable not set", var))?;
            config.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("RECAP_MODEL") {
            if !model.trim().is_empty() {
                config.model = model;
            }
        }
        if let Ok(base_url) = std::env::var("RECAP_BASE_URL") {
            if !base_url.trim().is_empty() {
                config.base_url = base_url.trim_end_matches('/').to_string();
            }
        }

        Ok(config)
    }
}

/// Resolve a provider configuration to a client, once, at construction.
///
/// Clients are wrapped in the transient-retry layer unless `max_retries` is 0.
pub fn build_provider(config: ProviderConfig) -> Result<Arc<dyn ProviderClient>> {
    let max_retries = config.max_retries;
    let client: Arc<dyn ProviderClient> = match config.kind {
        ProviderKind::Anthropic => Arc::new(AnthropicClient::new(config)?),
        ProviderKind::OpenAi | ProviderKind::Ollama => Arc::new(OpenAiClient::new(config)?),
    };

    if max_retries == 0 {
        return Ok(client);
    }
    Ok(Arc::new(RetryingProvider::new(
        client,
        RetryPolicy {
            max_retries,
            ..RetryPolicy::default()
        },
    )))
}

/// Build the HTTP client shared by provider implementations
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

/// Whether a non-success HTTP status is worth retrying
pub(crate) fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::CONFLICT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

/// Turn a non-success response into a classified provider error
pub(crate) async fn check_status(provider: &str, response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = format!("{} API error: {} - {}", provider, status, body);
    if is_transient_status(status) {
        Err(ProviderError::Transient(message))
    } else {
        Err(ProviderError::Fatal(message))
    }
}

/// Classify a transport-level failure
pub(crate) fn transport_error(provider: &str, err: reqwest::Error) -> ProviderError {
    let message = format!("Failed to send request to {} API: {}", provider, err);
    if err.is_timeout() || err.is_connect() {
        ProviderError::Transient(message)
    } else {
        ProviderError::Fatal(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_from_str() {
        assert_eq!("Anthropic".parse::<ProviderKind>(), Ok(ProviderKind::Anthropic));
        assert_eq!(" openai ".parse::<ProviderKind>(), Ok(ProviderKind::OpenAi));
        assert_eq!("ollama".parse::<ProviderKind>(), Ok(ProviderKind::Ollama));
        assert!("bard".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient_status(StatusCode::REQUEST_TIMEOUT));
        assert!(!is_transient_status(StatusCode::UNAUTHORIZED));
        assert!(!is_transient_status(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_config_defaults_per_kind() {
        let config = ProviderConfig::new(ProviderKind::Ollama);
        assert!(config.api_key.is_none());
        assert_eq!(config.base_url, "http://localhost:11434/v1");
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_build_provider_resolves_kind() {
        let provider = build_provider(ProviderConfig::new(ProviderKind::Ollama)).unwrap();
        assert_eq!(provider.name(), "ollama");
        assert_eq!(provider.model(), "llama3.1");

        let mut config = ProviderConfig::new(ProviderKind::Anthropic);
        config.api_key = Some("test-key".to_string());
        config.max_retries = 0;
        let provider = build_provider(config).unwrap();
        assert_eq!(provider.name(), "anthropic");
    }
}
