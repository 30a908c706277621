use tracing::{info, warn};

use super::{StageContext, generate};
use crate::error::{Phase, PipelineError, PipelineResult, RefinementError};
use crate::llm::build_refine_prompt;

/// What a refinement run produced
#[derive(Debug, Clone, PartialEq)]
pub struct RefineOutcome {
    /// Output of the last completed pass, or the input if none completed
    pub text: String,
    pub passes_completed: u32,
    /// Why refinement stopped early
    pub error: Option<RefinementError>,
}

/// Stage 3: chain-of-density refinement
///
/// Each pass feeds the previous pass's output back to the model with
/// instructions to add missing entities without growing the text. Zero
/// passes returns the input untouched. A failed pass (budget, provider, or
/// empty response) stops refinement and keeps the last good text; only
/// cancellation is returned as an error.
pub async fn refine(ctx: StageContext<'_>, draft: &str, passes: u32) -> PipelineResult<RefineOutcome> {
    let mut outcome = RefineOutcome {
        text: draft.to_string(),
        passes_completed: 0,
        error: None,
    };

    for pass in 1..=passes {
        match refine_pass(ctx, &outcome.text, pass, passes).await? {
            Ok(text) => {
                info!("Refine: pass {} of {} done, {} chars", pass, passes, text.len());
                outcome.text = text;
                outcome.passes_completed = pass;
            }
            Err(error) => {
                warn!("Refine: stopping after {} passes: {}", pass - 1, error);
                outcome.error = Some(error);
                break;
            }
        }
    }

    Ok(outcome)
}

/// One pass. The outer result carries cancellation; the inner one a recoverable failure.
async fn refine_pass(
    ctx: StageContext<'_>,
    text: &str,
    pass: u32,
    total: u32,
) -> PipelineResult<Result<String, RefinementError>> {
    let cancelled = || PipelineError::Cancelled {
        phase: Phase::Refine,
    };
    if ctx.cancel.is_cancelled() {
        return Err(cancelled());
    }

    let prompt = build_refine_prompt(ctx.template, text, pass, total);
    let estimate = tokio::select! {
        _ = ctx.cancel.cancelled() => return Err(cancelled()),
        estimate = ctx.preflight.estimate(ctx.provider.as_ref(), &prompt) => estimate,
    };
    let estimate = match estimate {
        Ok(estimate) => estimate,
        Err(error) => return Ok(Err(RefinementError::Provider { pass, error })),
    };

    let budget = ctx.budget;
    if !budget.fits(estimate.tokens) {
        return Ok(Err(RefinementError::BudgetExceeded {
            pass,
            input_tokens: estimate.tokens,
            max_output_tokens: budget.max_output_tokens,
            safety_margin: budget.safety_margin,
            context_window: budget.context_window,
        }));
    }

    let response = generate(
        ctx.provider.as_ref(),
        &prompt,
        budget.max_output_tokens,
        ctx.cancel,
    )
    .await
    .ok_or_else(cancelled)?;

    Ok(match response {
        Ok(text) if text.trim().is_empty() => Err(RefinementError::EmptyResponse { pass }),
        Ok(text) => Ok(text),
        Err(error) => Err(RefinementError::Provider { pass, error }),
    })
}
