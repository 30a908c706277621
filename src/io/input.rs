use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::Value;

use crate::models::{DeepgramResponse, DeepgramWord, Segment, Template, Transcript, Word};

/// Load a transcript file, detecting native or Deepgram JSON
pub fn load_transcript(path: &Path) -> Result<Transcript> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    parse_transcript_json(&content).with_context(|| format!("Failed to parse transcript: {:?}", path))
}

/// Parse transcript JSON in any supported shape:
/// a Deepgram response, `{"segments": [...]}`, or a bare segment array
pub fn parse_transcript_json(json: &str) -> Result<Transcript> {
    let value: Value = serde_json::from_str(json).context("Invalid JSON")?;

    if value.get("results").is_some() {
        let response: DeepgramResponse =
            serde_json::from_value(value).context("Failed to parse Deepgram JSON")?;
        return Ok(transcript_from_deepgram(&response));
    }

    if value.get("segments").is_some() {
        return serde_json::from_value(value).context("Failed to parse transcript segments");
    }
    if value.is_array() {
        let segments: Vec<Segment> =
            serde_json::from_value(value).context("Failed to parse transcript segments")?;
        return Ok(Transcript::new(segments));
    }
    bail!("Unrecognized transcript format (expected Deepgram JSON or a segment list)")
}

/// Parse a Deepgram JSON string into a Transcript
pub fn parse_deepgram_json(json: &str) -> Result<Transcript> {
    let response: DeepgramResponse =
        serde_json::from_str(json).context("Failed to parse Deepgram JSON")?;
    Ok(transcript_from_deepgram(&response))
}

/// Group consecutive words by speaker into segments
pub fn transcript_from_deepgram(response: &DeepgramResponse) -> Transcript {
    let mut segments: Vec<Segment> = Vec::new();
    let mut current: Option<(Option<u32>, Vec<&DeepgramWord>)> = None;

    for word in response.words() {
        let same_speaker = current
            .as_ref()
            .is_some_and(|(speaker, _)| *speaker == word.speaker);

        if same_speaker {
            if let Some((_, words)) = current.as_mut() {
                words.push(word);
            }
            continue;
        }

        // Close the current turn
        if let Some((_, words)) = current.take() {
            segments.push(segment_from_words(&words));
        }
        current = Some((word.speaker, vec![word]));
    }
    if let Some((_, words)) = current {
        segments.push(segment_from_words(&words));
    }

    Transcript::new(segments)
}

fn segment_from_words(words: &[&DeepgramWord]) -> Segment {
    let start = words.first().map(|w| w.start).unwrap_or_default();
    let end = words.iter().map(|w| w.end).fold(start, f64::max);
    let speaker = words
        .first()
        .map(|w| w.speaker_label())
        .unwrap_or_default();
    let text = words
        .iter()
        .map(|w| w.display_text())
        .collect::<Vec<_>>()
        .join(" ");

    Segment {
        start,
        end,
        speaker,
        text,
        words: words
            .iter()
            .map(|w| Word {
                start: w.start,
                end: w.end,
                text: w.display_text().to_string(),
                confidence: w.confidence,
            })
            .collect(),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TemplateFile {
    Many(Vec<Template>),
    One(Box<Template>),
}

/// Load extra templates from a JSON file holding one template or a list
pub fn load_templates(path: &Path) -> Result<Vec<Template>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    let templates = match serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse templates: {:?}", path))?
    {
        TemplateFile::Many(templates) => templates,
        TemplateFile::One(template) => vec![*template],
    };

    for template in &templates {
        if template.section_names.is_empty() {
            bail!("Template '{}' has no section names", template.name);
        }
        if !template.user_prompt_template.contains("{transcript}") {
            bail!("Template '{}' prompt has no {{transcript}} placeholder", template.name);
        }
    }
    Ok(templates)
}
