use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use recap::{
    LocalTokenizer, Pipeline, PipelineConfig, Preflight, ProviderConfig, ProviderKind, RunOptions,
    TemplateRegistry, TokenBudget, Transcript, build_provider, load_templates, load_transcript,
    write_summary_json, write_summary_markdown,
};

#[derive(Parser)]
#[command(name = "recap")]
#[command(author, version, about = "Long-transcript summarization with map-reduce LLM calls", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every subcommand
#[derive(clap::Args)]
struct CommonArgs {
    /// Input transcript file (native segment JSON or Deepgram JSON)
    #[arg(short, long)]
    input: PathBuf,

    /// Template to use instead of keyword selection
    #[arg(short, long)]
    template: Option<String>,

    /// Extra templates (JSON file with one template or a list)
    #[arg(long)]
    templates: Option<PathBuf>,

    /// Target chunk length in seconds
    #[arg(long, default_value = "1800")]
    chunk_seconds: f64,

    /// Model context window in tokens
    #[arg(long, default_value = "200000")]
    context_window: usize,

    /// Tokens reserved for each response
    #[arg(long, default_value = "4096")]
    max_output_tokens: usize,

    /// Extra headroom for estimation error
    #[arg(long, default_value = "1024")]
    safety_margin: usize,

    /// HuggingFace tokenizer.json for local token estimates
    #[arg(long)]
    tokenizer: Option<PathBuf>,

    /// Keyword matches needed to pick a specialized template
    #[arg(long, default_value = "2")]
    min_template_matches: usize,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a transcript
    Summarize {
        #[command(flatten)]
        common: CommonArgs,

        /// Output file for the structured summary (JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// Output file for the markdown report
        #[arg(long)]
        markdown: Option<PathBuf>,

        /// Provider: anthropic, openai or ollama
        #[arg(long, default_value = "anthropic")]
        provider: ProviderKind,

        /// Model override (defaults to RECAP_MODEL or the provider default)
        #[arg(long)]
        model: Option<String>,

        /// Chain-of-density refinement passes
        #[arg(long, default_value = "1")]
        refine: u32,

        /// Concurrent chunk summaries
        #[arg(long, default_value = "4")]
        concurrency: usize,

        /// Retries for transient provider errors
        #[arg(long, default_value = "3")]
        max_retries: u32,
    },

    /// Show template choice and chunk plan without calling a provider
    Preview {
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Summarize {
            common,
            output,
            markdown,
            provider,
            model,
            refine,
            concurrency,
            max_retries,
        } => {
            setup_logging(common.verbose);
            let mut config = ProviderConfig::from_env(provider)?;
            if let Some(model) = model {
                config.model = model;
            }
            config.max_retries = max_retries;
            run_summarize(&common, config, &output, markdown.as_deref(), refine, concurrency).await
        }
        Commands::Preview { common } => {
            setup_logging(common.verbose);
            run_preview(&common)
        }
    }
}

fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn budget(common: &CommonArgs) -> TokenBudget {
    TokenBudget::new(
        common.context_window,
        common.max_output_tokens,
        common.safety_margin,
    )
}

fn run_options(common: &CommonArgs, refinement_passes: u32) -> RunOptions {
    RunOptions {
        template_override: common.template.clone(),
        chunk_seconds: common.chunk_seconds,
        refinement_passes,
    }
}

fn registry(common: &CommonArgs) -> Result<TemplateRegistry> {
    let mut registry = TemplateRegistry::builtin();
    if let Some(path) = &common.templates {
        for template in load_templates(path)? {
            info!("Registered template '{}'", template.name);
            registry.register(template);
        }
    }
    Ok(registry)
}

fn preflight(common: &CommonArgs) -> Result<Preflight> {
    let tokenizer = match &common.tokenizer {
        Some(path) => LocalTokenizer::from_file(path)?,
        None => LocalTokenizer::Heuristic,
    };
    Ok(Preflight::new(tokenizer))
}

fn load(common: &CommonArgs) -> Result<Transcript> {
    info!("Loading transcript from {:?}", common.input);
    let transcript = load_transcript(&common.input).context("Failed to load input transcript")?;
    info!(
        "Loaded {} segments, {} speakers, {:.1}s",
        transcript.len(),
        transcript.speakers().len(),
        transcript.duration()
    );
    Ok(transcript)
}

async fn run_summarize(
    common: &CommonArgs,
    provider_config: ProviderConfig,
    output: &Path,
    markdown: Option<&Path>,
    refinement_passes: u32,
    concurrency: usize,
) -> Result<()> {
    let transcript = load(common)?;

    info!(
        "Using {} model {}",
        provider_config.kind, provider_config.model
    );
    let provider = build_provider(provider_config)?;
    let pipeline = Pipeline::new(provider)
        .with_registry(registry(common)?)
        .with_preflight(preflight(common)?)
        .with_config(PipelineConfig {
            max_concurrency: concurrency,
            min_template_matches: common.min_template_matches,
        });

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling run");
            on_signal.cancel();
        }
    });

    let summary = pipeline
        .summarize(
            &transcript,
            &run_options(common, refinement_passes),
            &budget(common),
            &cancel,
        )
        .await
        .context("Summarization failed")?;

    if let Some(error) = &summary.metadata.refinement_error {
        warn!("Refinement stopped early: {}", error);
    }

    write_summary_json(&summary, output)?;
    info!("Summary written to {:?}", output);

    if let Some(path) = markdown {
        let title = common
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Summary".to_string());
        write_summary_markdown(&summary, &title, path)?;
        info!("Markdown report written to {:?}", path);
    }

    info!(
        "Complete: {} sections, {} of {} refinement passes",
        summary.sections.len(),
        summary.metadata.refinement_passes_completed,
        summary.metadata.refinement_passes_requested
    );
    Ok(())
}

/// Preview needs no credentials; a local-only provider config stands in
fn run_preview(common: &CommonArgs) -> Result<()> {
    let transcript = load(common)?;
    let provider = build_provider(ProviderConfig::new(ProviderKind::Ollama))?;
    let pipeline = Pipeline::new(provider)
        .with_registry(registry(common)?)
        .with_preflight(preflight(common)?)
        .with_config(PipelineConfig {
            min_template_matches: common.min_template_matches,
            ..PipelineConfig::default()
        });

    let preview = pipeline
        .preview(&transcript, &run_options(common, 0), &budget(common))
        .context("Preview failed")?;

    println!("Run Preview");
    println!("===========");
    println!("Segments: {}", transcript.len());
    println!("Speakers: {}", transcript.speakers().join(", "));
    println!("Duration: {:.1}s", transcript.duration());
    println!("Template: {} ({:?})", preview.template, preview.reason);
    for (name, score) in &preview.scores {
        println!("  {}: {} keyword matches", name, score);
    }
    println!(
        "Input limit per call: {} tokens",
        preview.budget.max_input_tokens()
    );
    println!();

    println!("Chunks");
    println!("------");
    for chunk in &preview.chunks {
        println!(
            "{:>3}  {}  {:>4} segments  ~{:>7} tokens{}",
            chunk.index,
            chunk.time_range,
            chunk.segment_count,
            chunk.input_tokens,
            if chunk.fits { "" } else { "  OVER BUDGET" }
        );
    }

    let over = preview.chunks.iter().filter(|c| !c.fits).count();
    if over > 0 {
        println!();
        println!("{} chunks exceed the budget; lower --chunk-seconds", over);
    }
    Ok(())
}
