pub mod error;
pub mod heuristics;
pub mod io;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod stages;

pub use error::{
    ChunkingError, ExtractionFailure, Phase, PipelineError, PipelineResult, ProviderError,
    RefinementError,
};
pub use heuristics::{SelectorConfig, sanitize, select_template};
pub use io::{load_templates, load_transcript, write_summary_json, write_summary_markdown};
pub use llm::{
    EstimateSource, LocalTokenizer, Preflight, ProviderClient, ProviderConfig, ProviderKind,
    RetryPolicy, RetryingProvider, build_provider, extract,
};
pub use models::{
    Chunk, FinalSummary, Segment, SummaryMetadata, SummarySection, Template, TemplateRegistry,
    TokenBudget, Transcript,
};
pub use pipeline::{Pipeline, PipelineConfig, RunOptions, RunPreview, summarize};
pub use stages::{chunk_transcript, refine};
