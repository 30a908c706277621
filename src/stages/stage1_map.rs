use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::{StageContext, generate};
use crate::error::{Phase, PipelineError, PipelineResult, ProviderError};
use crate::llm::{Prompt, build_map_prompt};
use crate::models::{Chunk, PartialSummary, Transcript};

/// Default number of concurrent map calls
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Stage 1: summarize every chunk
///
/// 1. Build and preflight every chunk prompt; a chunk that does not fit
///    fails the run before any generation call
/// 2. Fan out generation calls, at most `max_concurrency` at a time
/// 3. Store each result in its chunk's slot, whatever the completion order
/// 4. Return only once every slot is filled
///
/// The first failing chunk cancels its in-flight siblings and ends the run.
pub async fn execute_map(
    ctx: StageContext<'_>,
    transcript: &Transcript,
    chunks: &[Chunk],
    max_concurrency: usize,
) -> PipelineResult<Vec<PartialSummary>> {
    let prompts: Vec<Prompt> = chunks
        .iter()
        .map(|chunk| build_map_prompt(ctx.template, chunk, transcript))
        .collect();

    for (chunk, prompt) in chunks.iter().zip(&prompts) {
        if ctx.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled { phase: Phase::Map });
        }
        tokio::select! {
            _ = ctx.cancel.cancelled() => {
                return Err(PipelineError::Cancelled { phase: Phase::Map });
            }
            checked = ctx.preflight.check(
                ctx.provider.as_ref(),
                prompt,
                ctx.budget,
                Phase::Map,
                Some(chunk.index),
            ) => {
                checked?;
            }
        }
    }

    info!(
        "Map: summarizing {} chunks with template '{}' (concurrency {})",
        chunks.len(),
        ctx.template.name,
        max_concurrency.max(1)
    );

    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let siblings = ctx.cancel.child_token();
    let max_output_tokens = ctx.budget.max_output_tokens;
    let mut workers = JoinSet::new();

    // Workers report their position in `chunks`; `chunk.index` is only a label
    for (slot, (chunk, prompt)) in chunks.iter().zip(prompts).enumerate() {
        let index = chunk.index;
        let provider = Arc::clone(ctx.provider);
        let semaphore = Arc::clone(&semaphore);
        let cancel = siblings.clone();

        workers.spawn(async move {
            let _permit = tokio::select! {
                _ = cancel.cancelled() => return (slot, None),
                permit = semaphore.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return (slot, None),
                },
            };
            debug!("Map: chunk {} started", index);
            let result = generate(provider.as_ref(), &prompt, max_output_tokens, &cancel).await;
            (slot, result)
        });
    }

    let mut slots: Vec<Option<PartialSummary>> = vec![None; chunks.len()];

    while let Some(joined) = workers.join_next().await {
        let outcome = match joined {
            Ok((slot, Some(Ok(text)))) => {
                let chunk = &chunks[slot];
                if text.trim().is_empty() {
                    warn!("Map: chunk {} returned an empty summary", chunk.index);
                }
                info!(
                    "Map: chunk {} ({}) done, {} chars",
                    chunk.index,
                    chunk.time_range(),
                    text.len()
                );
                slots[slot] = Some(PartialSummary {
                    chunk_index: chunk.index,
                    time_range: chunk.time_range(),
                    text,
                });
                continue;
            }
            Ok((slot, Some(Err(error)))) => PipelineError::Provider {
                phase: Phase::Map,
                chunk_index: Some(chunks[slot].index),
                error,
            },
            Ok((_, None)) => PipelineError::Cancelled { phase: Phase::Map },
            Err(e) => PipelineError::Provider {
                phase: Phase::Map,
                chunk_index: None,
                error: ProviderError::Fatal(format!("map worker failed: {}", e)),
            },
        };

        warn!("Map: aborting run: {}", outcome);
        siblings.cancel();
        workers.abort_all();
        return Err(outcome);
    }

    // Barrier: every chunk must have produced its slot
    slots
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or(PipelineError::Cancelled { phase: Phase::Map })
}
