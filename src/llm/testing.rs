use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::ProviderClient;
use crate::error::ProviderError;

/// One recorded generation call
#[derive(Debug, Clone)]
pub struct Call {
    /// Invocation order, starting at 0
    pub index: usize,
    pub system: String,
    pub user: String,
    pub max_output_tokens: usize,
}

type Responder = dyn Fn(&Call) -> Result<String, ProviderError> + Send + Sync;
type Delay = dyn Fn(&Call) -> Duration + Send + Sync;
type Counter = dyn Fn(&str, &str) -> Result<Option<usize>, ProviderError> + Send + Sync;

pub struct ScriptedProvider {
    respond: Box<Responder>,
    delay: Option<Box<Delay>>,
    count: Option<Box<Counter>>,
    next_index: AtomicUsize,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedProvider {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&Call) -> Result<String, ProviderError> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            delay: None,
            count: None,
            next_index: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Replies with the user prompt unchanged
    pub fn echo() -> Self {
        Self::new(|call| Ok(call.user.clone()))
    }

    pub fn with_delay<F>(mut self, delay: F) -> Self
    where
        F: Fn(&Call) -> Duration + Send + Sync + 'static,
    {
        self.delay = Some(Box::new(delay));
        self
    }

    pub fn with_token_count<F>(mut self, count: F) -> Self
    where
        F: Fn(&str, &str) -> Result<Option<usize>, ProviderError> + Send + Sync + 'static,
    {
        self.count = Some(Box::new(count));
        self
    }

    /// Generation calls made so far
    pub fn call_count(&self) -> usize {
        self.next_index.load(Ordering::SeqCst)
    }

    /// Completed generation calls, in completion order
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderClient for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn summarize(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_output_tokens: usize,
    ) -> Result<String, ProviderError> {
        let call = Call {
            index: self.next_index.fetch_add(1, Ordering::SeqCst),
            system: system_prompt.to_string(),
            user: user_prompt.to_string(),
            max_output_tokens,
        };
        if let Some(delay) = &self.delay {
            tokio::time::sleep(delay(&call)).await;
        }
        let result = (self.respond)(&call);
        self.calls.lock().unwrap().push(call);
        result
    }

    async fn count_tokens(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<Option<usize>, ProviderError> {
        match &self.count {
            Some(count) => count(system_prompt, user_prompt),
            None => Ok(None),
        }
    }
}
