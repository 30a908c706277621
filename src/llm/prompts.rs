use crate::heuristics::sanitize;
use crate::models::{Chunk, PartialSummary, Segment, Template, Transcript, format_clock};

/// System and user text for one provider call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    /// Role/content pairs exactly as transmitted; an empty system prompt is omitted
    pub fn messages(&self) -> Vec<(&'static str, &str)> {
        let mut messages = Vec::with_capacity(2);
        if !self.system.is_empty() {
            messages.push(("system", self.system.as_str()));
        }
        messages.push(("user", self.user.as_str()));
        messages
    }
}

/// Render segments as `[HH:MM:SS] Speaker: text` lines, sanitized
pub fn render_chunk_transcript(segments: &[Segment]) -> String {
    let mut text = String::new();
    for segment in segments {
        let speaker = sanitize(&segment.speaker);
        let line = sanitize(&segment.text);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let speaker = match speaker.trim() {
            "" => "Unknown",
            s => s,
        };
        text.push_str(&format!("[{}] {}: {}\n", format_clock(segment.start), speaker, line));
    }
    text
}

/// Prompt summarizing one chunk
pub fn build_map_prompt(template: &Template, chunk: &Chunk, transcript: &Transcript) -> Prompt {
    let excerpt = render_chunk_transcript(chunk.segments(transcript));
    Prompt {
        system: template.system_prompt.clone(),
        user: template.render_user_prompt(&chunk.time_range(), excerpt.trim_end()),
    }
}

/// Instructions asking for a JSON object keyed by the template's sections
fn json_instructions(template: &Template) -> String {
    let keys = template
        .section_names
        .iter()
        .map(|name| format!("\"{}\"", name))
        .collect::<Vec<_>>()
        .join(", ");

    let mut text = String::new();
    text.push_str("## Output Format\n");
    text.push_str("Respond with a single JSON object and nothing else:\n");
    text.push_str("```json\n{\"sections\": {\"<section name>\": \"<markdown text>\"}}\n```\n");
    text.push_str(&format!("Use exactly these section keys, in this order: {}.\n", keys));
    text.push_str("Write each value as markdown; use \"- \" bullet lines for lists. ");
    text.push_str("Use an empty string for a section with nothing to report.\n");
    text
}

/// Prompt combining all partial summaries, in chunk order, into one draft
pub fn build_reduce_prompt(template: &Template, partials: &[PartialSummary]) -> Prompt {
    let mut user = String::new();

    user.push_str(&format!(
        "# Partial summaries ({} parts, chronological)\n\n",
        partials.len()
    ));
    for (i, partial) in partials.iter().enumerate() {
        user.push_str(&format!("## Part {} ({})\n\n", i + 1, partial.time_range));
        user.push_str(partial.text.trim());
        user.push_str("\n\n");
    }

    user.push_str("## Instructions\n");
    user.push_str("Merge these partial summaries of one recording into a single summary.\n");
    user.push_str("- Remove duplication across parts; keep the chronology where it matters\n");
    user.push_str("- Keep every decision, owner, date and number that appears in any part\n");
    user.push_str("- Do not add facts that are not in the partial summaries\n\n");
    user.push_str(&json_instructions(template));

    Prompt {
        system: template.system_prompt.clone(),
        user,
    }
}

/// Chain-of-density prompt for one refinement pass
pub fn build_refine_prompt(template: &Template, draft: &str, pass: u32, total: u32) -> Prompt {
    let mut user = String::new();

    user.push_str(&format!("# Summary draft (refinement pass {} of {})\n\n", pass, total));
    user.push_str(draft.trim());
    user.push_str("\n\n## Instructions\n");
    user.push_str("Rewrite this summary to be denser, not longer.\n");
    user.push_str("- Identify salient entities, numbers, owners and dates that the draft leaves vague\n");
    user.push_str("- Work them in by compressing filler and merging redundant statements\n");
    user.push_str("- Keep the overall length about the same\n");
    user.push_str("- Keep every fact already present; do not invent new ones\n\n");
    user.push_str(&json_instructions(template));

    Prompt {
        system: template.system_prompt.clone(),
        user,
    }
}
