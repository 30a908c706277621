pub mod stage0_chunk;
pub mod stage1_map;
pub mod stage2_reduce;
pub mod stage3_refine;

pub use stage0_chunk::*;
pub use stage1_map::*;
pub use stage2_reduce::*;
pub use stage3_refine::*;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::llm::{Preflight, Prompt, ProviderClient};
use crate::models::{Template, TokenBudget};

/// Everything a model-calling stage needs for one run
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub provider: &'a Arc<dyn ProviderClient>,
    pub preflight: &'a Preflight,
    /// Template selected for the run
    pub template: &'a Template,
    /// Effective budget; its output reservation is what every call asks for
    pub budget: &'a TokenBudget,
    /// Run-level cancellation signal
    pub cancel: &'a CancellationToken,
}

/// One generation call raced against cancellation. `None` if cancelled first.
pub(crate) async fn generate(
    provider: &dyn ProviderClient,
    prompt: &Prompt,
    max_output_tokens: usize,
    cancel: &CancellationToken,
) -> Option<Result<String, ProviderError>> {
    if cancel.is_cancelled() {
        return None;
    }
    tokio::select! {
        _ = cancel.cancelled() => None,
        result = provider.summarize(&prompt.system, &prompt.user, max_output_tokens) => Some(result),
    }
}
