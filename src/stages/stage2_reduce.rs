use tracing::{info, warn};

use super::{StageContext, generate};
use crate::error::{Phase, PipelineError, PipelineResult};
use crate::llm::build_reduce_prompt;
use crate::models::PartialSummary;

/// Stage 2: merge partial summaries into one structured draft
///
/// Partials must already be in chunk order. The combined prompt is
/// preflighted as a whole; if it does not fit, the run fails with a reduce
/// phase budget error and no call is made.
pub async fn execute_reduce(
    ctx: StageContext<'_>,
    partials: &[PartialSummary],
) -> PipelineResult<String> {
    let prompt = build_reduce_prompt(ctx.template, partials);
    let cancelled = || PipelineError::Cancelled {
        phase: Phase::Reduce,
    };

    if ctx.cancel.is_cancelled() {
        return Err(cancelled());
    }
    let estimate = tokio::select! {
        _ = ctx.cancel.cancelled() => return Err(cancelled()),
        checked = ctx.preflight.check(ctx.provider.as_ref(), &prompt, ctx.budget, Phase::Reduce, None) => checked?,
    };

    info!(
        "Reduce: merging {} partial summaries ({} input tokens)",
        partials.len(),
        estimate.tokens
    );

    let draft = generate(
        ctx.provider.as_ref(),
        &prompt,
        ctx.budget.max_output_tokens,
        ctx.cancel,
    )
    .await
    .ok_or_else(cancelled)?
    .map_err(|error| PipelineError::Provider {
        phase: Phase::Reduce,
        chunk_index: None,
        error,
    })?;

    if draft.trim().is_empty() {
        warn!("Reduce: provider returned an empty draft");
    }
    Ok(draft)
}
