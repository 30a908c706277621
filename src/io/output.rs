use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::models::{FinalSummary, format_clock};

/// Write the summary, including metadata, as pretty JSON
pub fn write_summary_json(summary: &FinalSummary, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create file: {:?}", path))?;
    serde_json::to_writer_pretty(file, summary).context("Failed to write JSON")?;
    Ok(())
}

/// Markdown document: title, run details, then the summary body
pub fn render_report(summary: &FinalSummary, title: &str) -> String {
    let metadata = &summary.metadata;
    let mut output = String::new();

    output.push_str(&format!("# {}\n\n", title));
    output.push_str(&format!(
        "_Template: {} | Model: {} | Duration: {} | Chunks: {}_\n\n",
        metadata.template,
        metadata.model,
        format_clock(metadata.transcript_duration_seconds),
        metadata.chunk_count
    ));

    if summary.raw_markdown.trim().is_empty() {
        output.push_str("_Nothing to summarize._\n");
    } else {
        output.push_str(summary.raw_markdown.trim_end());
        output.push('\n');
    }
    output
}

/// Write the markdown report to a file
pub fn write_summary_markdown(summary: &FinalSummary, title: &str, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create file: {:?}", path))?;
    write!(file, "{}", render_report(summary, title))?;
    Ok(())
}
