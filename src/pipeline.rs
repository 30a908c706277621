use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::PipelineResult;
use crate::heuristics::{SelectionReason, SelectorConfig, TemplateSelection, select_template};
use crate::llm::{Preflight, ProviderClient, build_map_prompt, extract};
use crate::models::{
    FinalSummary, SummaryMetadata, TemplateRegistry, TokenBudget, Transcript,
};
use crate::stages::{
    DEFAULT_CHUNK_SECONDS, DEFAULT_MAX_CONCURRENCY, StageContext,
    chunk_transcript, execute_map, execute_reduce, refine,
};

/// Default number of chain-of-density passes
pub const DEFAULT_REFINEMENT_PASSES: u32 = 1;

/// Settings fixed for the lifetime of a pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Map calls in flight at once
    pub max_concurrency: usize,
    /// Keyword matches a category needs before it can win template selection
    pub min_template_matches: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            min_template_matches: SelectorConfig::default().min_matches,
        }
    }
}

/// Per-run options
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Template name to use instead of keyword selection
    pub template_override: Option<String>,
    /// Target chunk length in seconds
    pub chunk_seconds: f64,
    pub refinement_passes: u32,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            template_override: None,
            chunk_seconds: DEFAULT_CHUNK_SECONDS,
            refinement_passes: DEFAULT_REFINEMENT_PASSES,
        }
    }
}

/// Dry-run view of one chunk
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPreview {
    pub index: usize,
    pub time_range: String,
    pub segment_count: usize,
    /// Local estimate of the map prompt
    pub input_tokens: usize,
    pub fits: bool,
}

/// What a run would do, computed without calling the provider
#[derive(Debug, Clone)]
pub struct RunPreview {
    pub template: String,
    pub reason: SelectionReason,
    pub scores: Vec<(String, usize)>,
    /// Budget after applying the template's output cap
    pub budget: TokenBudget,
    pub chunks: Vec<ChunkPreview>,
}

/// A configured summarization pipeline bound to one provider
pub struct Pipeline {
    provider: Arc<dyn ProviderClient>,
    preflight: Preflight,
    registry: TemplateRegistry,
    selector: SelectorConfig,
    config: PipelineConfig,
}

impl Pipeline {
    /// Pipeline with built-in templates and default settings
    pub fn new(provider: Arc<dyn ProviderClient>) -> Self {
        Self {
            provider,
            preflight: Preflight::default(),
            registry: TemplateRegistry::builtin(),
            selector: SelectorConfig::default(),
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.selector.min_matches = config.min_template_matches;
        self.config = config;
        self
    }

    pub fn with_preflight(mut self, preflight: Preflight) -> Self {
        self.preflight = preflight;
        self
    }

    pub fn with_registry(mut self, registry: TemplateRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn select(&self, transcript: &Transcript, options: &RunOptions) -> PipelineResult<TemplateSelection> {
        select_template(
            transcript,
            options.template_override.as_deref(),
            &self.registry,
            &self.selector,
        )
    }

    /// Summarize a transcript.
    ///
    /// Unknown template overrides and malformed transcripts fail before any
    /// provider call. An empty
    /// transcript yields an empty summary without any call.
    pub async fn summarize(
        &self,
        transcript: &Transcript,
        options: &RunOptions,
        budget: &TokenBudget,
        cancel: &CancellationToken,
    ) -> PipelineResult<FinalSummary> {
        let selection = self.select(transcript, options)?;
        let template = selection.template;
        let chunks = chunk_transcript(transcript, options.chunk_seconds)?;

        let mut metadata = SummaryMetadata {
            template: template.name.clone(),
            provider: self.provider.name().to_string(),
            model: self.provider.model().to_string(),
            chunk_count: chunks.len(),
            chunk_seconds: options.chunk_seconds,
            transcript_duration_seconds: transcript.duration(),
            refinement_passes_requested: options.refinement_passes,
            ..SummaryMetadata::default()
        };

        if chunks.is_empty() {
            info!("Transcript is empty; nothing to summarize");
            return Ok(FinalSummary::empty(metadata));
        }

        info!(
            "Summarizing {} segments ({:.0}s) in {} chunks with {} / {}",
            transcript.len(),
            transcript.duration(),
            chunks.len(),
            metadata.provider,
            metadata.model
        );

        let budget = budget.with_output_cap(template.max_output_tokens);
        let ctx = StageContext {
            provider: &self.provider,
            preflight: &self.preflight,
            template: &template,
            budget: &budget,
            cancel,
        };

        let partials = execute_map(ctx, transcript, &chunks, self.config.max_concurrency).await?;
        let draft = execute_reduce(ctx, &partials).await?;
        let refined = refine(ctx, &draft, options.refinement_passes).await?;

        metadata.refinement_passes_completed = refined.passes_completed;
        metadata.refinement_error = refined.error.map(|e| e.to_string());

        let summary = extract(&refined.text, &template.section_names, metadata);
        info!(
            "Summary ready: {} sections ({:?} extraction)",
            summary.sections.len(),
            summary.metadata.extraction_method
        );
        Ok(summary)
    }

    /// Template choice, chunk plan and local map-prompt estimates, without provider calls
    pub fn preview(
        &self,
        transcript: &Transcript,
        options: &RunOptions,
        budget: &TokenBudget,
    ) -> PipelineResult<RunPreview> {
        let selection = self.select(transcript, options)?;
        let chunks = chunk_transcript(transcript, options.chunk_seconds)?;
        let budget = budget.with_output_cap(selection.template.max_output_tokens);

        let chunks = chunks
            .iter()
            .map(|chunk| {
                let prompt = build_map_prompt(&selection.template, chunk, transcript);
                let input_tokens = self.preflight.estimate_local(&prompt);
                ChunkPreview {
                    index: chunk.index,
                    time_range: chunk.time_range(),
                    segment_count: chunk.segment_count(),
                    input_tokens,
                    fits: budget.fits(input_tokens),
                }
            })
            .collect();

        Ok(RunPreview {
            template: selection.template.name,
            reason: selection.reason,
            scores: selection.scores,
            budget,
            chunks,
        })
    }
}

/// Summarize with default pipeline settings and no external cancellation
pub async fn summarize(
    transcript: &Transcript,
    template_override: Option<&str>,
    chunk_seconds: f64,
    refinement_passes: u32,
    provider: Arc<dyn ProviderClient>,
    budget: &TokenBudget,
) -> PipelineResult<FinalSummary> {
    let options = RunOptions {
        template_override: template_override.map(str::to_string),
        chunk_seconds,
        refinement_passes,
    };
    Pipeline::new(provider)
        .summarize(transcript, &options, budget, &CancellationToken::new())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Phase, PipelineError, ProviderError};
    use crate::llm::testing::ScriptedProvider;
    use crate::models::{ExtractionMethod, Segment};

    fn meeting() -> Transcript {
        Transcript::new(
            (0..6)
                .map(|i| {
                    let start = i as f64 * 600.0;
                    Segment::new(start, start + 600.0, "Ann", format!("agenda item {}", i))
                })
                .collect(),
        )
    }

    /// Map calls get plain notes; reduce and refine calls get JSON
    fn structured_provider() -> ScriptedProvider {
        ScriptedProvider::new(|call| {
            if call.user.contains("## Output Format") {
                Ok(format!(
                    "```json\n{{\"sections\": {{\"Overview\": \"call {}\", \"Decisions\": \"- ship\"}}}}\n```",
                    call.index
                ))
            } else {
                Ok("notes".to_string())
            }
        })
    }

    #[tokio::test]
    async fn test_end_to_end_metadata() {
        let provider = Arc::new(structured_provider());
        let options = RunOptions {
            chunk_seconds: 1_800.0,
            refinement_passes: 2,
            ..RunOptions::default()
        };

        let summary = Pipeline::new(provider.clone())
            .summarize(&meeting(), &options, &TokenBudget::default(), &CancellationToken::new())
            .await
            .unwrap();

        // 2 map + 1 reduce + 2 refine
        assert_eq!(provider.call_count(), 5);
        assert_eq!(summary.section_names(), vec!["Overview", "Decisions"]);
        assert_eq!(summary.section("Overview"), Some("call 4"));

        let metadata = &summary.metadata;
        assert_eq!(metadata.template, "general");
        assert_eq!(metadata.provider, "scripted");
        assert_eq!(metadata.chunk_count, 2);
        assert_eq!(metadata.refinement_passes_completed, 2);
        assert_eq!(metadata.extraction_method, ExtractionMethod::Fenced);
        assert_eq!(metadata.transcript_duration_seconds, 3_600.0);
    }

    #[tokio::test]
    async fn test_single_chunk_still_reduces() {
        let provider = Arc::new(structured_provider());
        let options = RunOptions {
            refinement_passes: 0,
            ..RunOptions::default()
        };
        let transcript = Transcript::new(vec![Segment::new(0.0, 30.0, "Ann", "quick sync")]);

        let summary = Pipeline::new(provider.clone())
            .summarize(&transcript, &options, &TokenBudget::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(provider.call_count(), 2);
        assert_eq!(summary.metadata.extraction_method, ExtractionMethod::Fenced);
    }

    #[tokio::test]
    async fn test_empty_transcript_makes_no_calls() {
        let provider = Arc::new(structured_provider());
        let summary = Pipeline::new(provider.clone())
            .summarize(
                &Transcript::default(),
                &RunOptions::default(),
                &TokenBudget::default(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(summary.sections.is_empty());
        assert_eq!(summary.metadata.chunk_count, 0);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_template_output_cap_applies() {
        let provider = Arc::new(structured_provider());
        let budget = TokenBudget::new(200_000, 16_000, 1_000);
        let options = RunOptions {
            refinement_passes: 0,
            ..RunOptions::default()
        };

        Pipeline::new(provider.clone())
            .summarize(&meeting(), &options, &budget, &CancellationToken::new())
            .await
            .unwrap();

        assert!(provider.calls().iter().all(|c| c.max_output_tokens == 4_096));
    }

    #[tokio::test]
    async fn test_refinement_failure_is_recorded_not_raised() {
        let provider = Arc::new(ScriptedProvider::new(|call| {
            if call.user.contains("refinement pass") {
                Err(ProviderError::Fatal("400".to_string()))
            } else if call.user.contains("## Output Format") {
                Ok("{\"Overview\": \"draft\"}".to_string())
            } else {
                Ok("notes".to_string())
            }
        }));
        let options = RunOptions {
            refinement_passes: 3,
            ..RunOptions::default()
        };

        let summary = Pipeline::new(provider)
            .summarize(&meeting(), &options, &TokenBudget::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.section("Overview"), Some("draft"));
        assert_eq!(summary.metadata.refinement_passes_completed, 0);
        assert!(summary.metadata.refinement_error.is_some());
    }

    #[tokio::test]
    async fn test_unknown_override_fails_before_calls() {
        let provider = Arc::new(structured_provider());
        let options = RunOptions {
            template_override: Some("retro".to_string()),
            ..RunOptions::default()
        };

        let err = Pipeline::new(provider.clone())
            .summarize(&meeting(), &options, &TokenBudget::default(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::UnknownTemplate { .. }));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_chunking_error_surfaces() {
        let provider: Arc<dyn ProviderClient> = Arc::new(structured_provider());
        let err = summarize(&meeting(), None, -5.0, 0, provider, &TokenBudget::default())
            .await
            .unwrap_err();

        assert_eq!(err.phase(), Phase::Chunk);
    }

    #[test]
    fn test_preview_without_calls() {
        let provider = Arc::new(structured_provider());
        let pipeline = Pipeline::new(provider.clone());
        let options = RunOptions {
            chunk_seconds: 1_200.0,
            ..RunOptions::default()
        };

        let preview = pipeline
            .preview(&meeting(), &options, &TokenBudget::default())
            .unwrap();

        assert_eq!(preview.template, "general");
        assert_eq!(preview.chunks.len(), 3);
        assert!(preview.chunks.iter().all(|c| c.fits && c.input_tokens > 0));
        assert_eq!(preview.budget.max_output_tokens, 4_096);
        assert_eq!(provider.call_count(), 0);
    }
}
