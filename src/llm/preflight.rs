use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tokenizers::Tokenizer;
use tracing::{debug, warn};

use super::{Prompt, ProviderClient};
use crate::error::{Phase, PipelineError, PipelineResult, ProviderError};
use crate::models::TokenBudget;

/// Per-message framing overhead in the local estimate
const TOKENS_PER_MESSAGE: usize = 4;
/// Tokens reserved for priming the assistant reply
const REPLY_PRIMING_TOKENS: usize = 3;
/// Characters per token for word runs in the heuristic tokenizer
const CHARS_PER_TOKEN: usize = 4;

/// Which strategy produced a token count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimateSource {
    /// Local tokenizer over the rendered messages
    Local,
    /// Provider's own count endpoint
    Remote,
}

impl fmt::Display for EstimateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenEstimate {
    pub tokens: usize,
    pub source: EstimateSource,
}

/// Deterministic local tokenizer
#[derive(Clone, Default)]
pub enum LocalTokenizer {
    /// Whitespace splits runs; alphanumeric runs cost one token per four
    /// characters (rounded up); every other character costs one token
    #[default]
    Heuristic,
    /// HuggingFace vocabulary loaded from a `tokenizer.json`
    Vocabulary(Box<Tokenizer>),
}

impl fmt::Debug for LocalTokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Heuristic => f.write_str("Heuristic"),
            Self::Vocabulary(_) => f.write_str("Vocabulary"),
        }
    }
}

impl LocalTokenizer {
    /// Load a HuggingFace `tokenizer.json`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| anyhow::anyhow!(e.to_string()))
            .with_context(|| format!("Failed to load tokenizer: {}", path.display()))?;
        Ok(Self::Vocabulary(Box::new(tokenizer)))
    }

    /// Token count for one piece of text
    pub fn count(&self, text: &str) -> usize {
        match self {
            Self::Heuristic => heuristic_count(text),
            Self::Vocabulary(tokenizer) => match tokenizer.encode(text, false) {
                Ok(encoding) => encoding.len(),
                Err(e) => {
                    warn!("Tokenizer failed ({}); using heuristic count", e);
                    heuristic_count(text)
                }
            },
        }
    }
}

/// ASCII word runs cost one token per `CHARS_PER_TOKEN` characters. Every
/// other non-whitespace character costs at least one, so CJK and other
/// non-Latin scripts are never undercounted.
fn heuristic_count(text: &str) -> usize {
    let mut tokens = 0;
    let mut run: usize = 0;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            run += 1;
            continue;
        }
        tokens += run.div_ceil(CHARS_PER_TOKEN);
        run = 0;
        if !c.is_whitespace() {
            tokens += 1;
        }
    }
    tokens + run.div_ceil(CHARS_PER_TOKEN)
}

/// Whether `input_tokens` fits the budget
pub fn fits(budget: &TokenBudget, input_tokens: usize) -> bool {
    budget.fits(input_tokens)
}

/// Sizes prompts against a budget before any generation call
#[derive(Debug, Clone, Default)]
pub struct Preflight {
    tokenizer: LocalTokenizer,
}

impl Preflight {
    pub fn new(tokenizer: LocalTokenizer) -> Self {
        Self { tokenizer }
    }

    /// Local estimate over the exact messages that would be sent
    pub fn estimate_local(&self, prompt: &Prompt) -> usize {
        prompt
            .messages()
            .iter()
            .map(|(role, content)| {
                self.tokenizer.count(role) + self.tokenizer.count(content) + TOKENS_PER_MESSAGE
            })
            .sum::<usize>()
            + REPLY_PRIMING_TOKENS
    }

    /// Remote count when the provider has one, local estimate otherwise
    pub async fn estimate(
        &self,
        provider: &dyn ProviderClient,
        prompt: &Prompt,
    ) -> Result<TokenEstimate, ProviderError> {
        match provider.count_tokens(&prompt.system, &prompt.user).await? {
            Some(tokens) => Ok(TokenEstimate {
                tokens,
                source: EstimateSource::Remote,
            }),
            None => Ok(TokenEstimate {
                tokens: self.estimate_local(prompt),
                source: EstimateSource::Local,
            }),
        }
    }

    /// Estimate a prompt and reject it if it does not fit.
    ///
    /// A failing remote count is reported as a provider error for `phase`;
    /// it does not silently fall back to the local estimate.
    pub async fn check(
        &self,
        provider: &dyn ProviderClient,
        prompt: &Prompt,
        budget: &TokenBudget,
        phase: Phase,
        chunk_index: Option<usize>,
    ) -> PipelineResult<TokenEstimate> {
        let estimate = self
            .estimate(provider, prompt)
            .await
            .map_err(|error| PipelineError::Provider {
                phase,
                chunk_index,
                error,
            })?;

        let fits = fits(budget, estimate.tokens);
        debug!(
            "Preflight {} phase{}: {} input tokens ({}), limit {}, fits: {}",
            phase,
            chunk_index.map(|i| format!(" chunk {}", i)).unwrap_or_default(),
            estimate.tokens,
            estimate.source,
            budget.max_input_tokens(),
            fits
        );

        if !fits {
            return Err(PipelineError::TokenBudgetExceeded {
                phase,
                chunk_index,
                input_tokens: estimate.tokens,
                max_output_tokens: budget.max_output_tokens,
                safety_margin: budget.safety_margin,
                context_window: budget.context_window,
                estimate: estimate.source,
            });
        }
        Ok(estimate)
    }
}
