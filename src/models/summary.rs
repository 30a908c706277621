use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which extraction attempt produced the summary sections
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// The whole response parsed as JSON
    Direct,
    /// JSON found inside a fenced code block
    Fenced,
    /// JSON found between the first `{` and last `}`
    Braces,
    /// Nothing parsed; raw text kept verbatim
    #[default]
    Fallback,
}

/// One named section of a summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarySection {
    pub name: String,
    pub text: String,
}

/// Facts about the run that produced a summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetadata {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// Template selected for the run
    pub template: String,
    pub provider: String,
    pub model: String,
    pub chunk_count: usize,
    pub chunk_seconds: f64,
    pub transcript_duration_seconds: f64,
    pub refinement_passes_requested: u32,
    pub refinement_passes_completed: u32,
    /// Why refinement stopped early, if it did
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refinement_error: Option<String>,
    pub extraction_method: ExtractionMethod,
}

impl Default for SummaryMetadata {
    fn default() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            template: String::new(),
            provider: String::new(),
            model: String::new(),
            chunk_count: 0,
            chunk_seconds: 0.0,
            transcript_duration_seconds: 0.0,
            refinement_passes_requested: 0,
            refinement_passes_completed: 0,
            refinement_error: None,
            extraction_method: ExtractionMethod::default(),
        }
    }
}

/// The structured result of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalSummary {
    /// Sections in display order
    pub sections: Vec<SummarySection>,
    /// Markdown rendering of the summary
    pub raw_markdown: String,
    pub metadata: SummaryMetadata,
}

impl FinalSummary {
    /// Build a summary from ordered sections, rendering the markdown
    pub fn from_sections(sections: Vec<SummarySection>, metadata: SummaryMetadata) -> Self {
        let raw_markdown = render_markdown(&sections);
        Self {
            sections,
            raw_markdown,
            metadata,
        }
    }

    /// Summary with no sections, used for empty transcripts
    pub fn empty(metadata: SummaryMetadata) -> Self {
        Self {
            sections: Vec::new(),
            raw_markdown: String::new(),
            metadata,
        }
    }

    pub fn section(&self, name: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.text.as_str())
    }

    pub fn section_names(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.name.as_str()).collect()
    }

    /// Serialize the sections in the shape the extractor accepts
    pub fn to_structured_json(&self) -> String {
        let sections: serde_json::Map<String, serde_json::Value> = self
            .sections
            .iter()
            .map(|s| (s.name.clone(), serde_json::Value::String(s.text.clone())))
            .collect();
        serde_json::json!({ "sections": sections }).to_string()
    }
}

/// Render sections as `## Name` markdown blocks
pub fn render_markdown(sections: &[SummarySection]) -> String {
    let mut markdown = String::new();
    for section in sections {
        if !markdown.is_empty() {
            markdown.push('\n');
        }
        markdown.push_str(&format!("## {}\n\n{}\n", section.name, section.text.trim_end()));
    }
    markdown
}
