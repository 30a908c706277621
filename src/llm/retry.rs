use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::ProviderClient;
use crate::error::ProviderError;

/// Backoff settings for transient provider failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles each time
    pub base_delay: Duration,
    /// Upper bound for a single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Provider wrapper that retries transient errors with exponential backoff.
///
/// Fatal errors are returned immediately. A transient error that survives
/// every retry is returned as-is, so callers still see it as transient.
pub struct RetryingProvider {
    inner: Arc<dyn ProviderClient>,
    policy: RetryPolicy,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn ProviderClient>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn with_retries<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut retry = 0;
        loop {
            match call().await {
                Err(e) if e.is_transient() && retry < self.policy.max_retries => {
                    retry += 1;
                    let delay = self.policy.delay_for(retry);
                    warn!(
                        "{} {} failed ({}); retry {} of {} in {:?}",
                        self.inner.name(),
                        operation,
                        e,
                        retry,
                        self.policy.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }
}

#[async_trait]
impl ProviderClient for RetryingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn summarize(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_output_tokens: usize,
    ) -> Result<String, ProviderError> {
        self.with_retries("generation", || {
            self.inner
                .summarize(system_prompt, user_prompt, max_output_tokens)
        })
        .await
    }

    async fn count_tokens(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<Option<usize>, ProviderError> {
        self.with_retries("token count", || {
            self.inner.count_tokens(system_prompt, user_prompt)
        })
        .await
    }
}
