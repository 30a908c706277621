use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::ExtractionFailure;
use crate::models::{ExtractionMethod, FinalSummary, SummaryMetadata, SummarySection};

/// Section name used when no structure could be recovered
pub const FALLBACK_SECTION: &str = "Summary";

static FENCED_BLOCK_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*[ \t]*\r?\n(.*?)```"));

type Attempt = fn(&str) -> Result<Value, ExtractionFailure>;

/// Ordered attempts; the first that yields sections wins
const ATTEMPTS: [(ExtractionMethod, Attempt); 3] = [
    (ExtractionMethod::Direct, parse_direct),
    (ExtractionMethod::Fenced, parse_fenced),
    (ExtractionMethod::Braces, parse_braces),
];

/// Sections recovered from model output, and how
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub sections: Vec<SummarySection>,
    pub method: ExtractionMethod,
}

/// Parse model output into ordered sections. Never fails.
///
/// `section_order` lists the expected sections; they come first, then any
/// extra keys in lexical order.
pub fn extract_sections(raw: &str, section_order: &[String]) -> Extraction {
    for (method, attempt) in ATTEMPTS {
        match attempt(raw).and_then(|value| sections_from_value(value, section_order)) {
            Ok(sections) => return Extraction { sections, method },
            Err(reason) => debug!("Extraction attempt {:?} failed: {}", method, reason),
        }
    }

    Extraction {
        sections: vec![SummarySection {
            name: FALLBACK_SECTION.to_string(),
            text: raw.to_string(),
        }],
        method: ExtractionMethod::Fallback,
    }
}

/// Build the final summary from model output.
///
/// In fallback the raw text is kept verbatim as both the single section and
/// the markdown.
pub fn extract(raw: &str, section_order: &[String], mut metadata: SummaryMetadata) -> FinalSummary {
    let Extraction { sections, method } = extract_sections(raw, section_order);
    metadata.extraction_method = method;

    if method == ExtractionMethod::Fallback {
        warn!("Model output was not structured; keeping raw text as a single section");
        return FinalSummary {
            sections,
            raw_markdown: raw.to_string(),
            metadata,
        };
    }
    FinalSummary::from_sections(sections, metadata)
}

fn parse_json(text: &str) -> Result<Value, ExtractionFailure> {
    serde_json::from_str(text.trim()).map_err(|e| ExtractionFailure::InvalidJson(e.to_string()))
}

fn parse_direct(raw: &str) -> Result<Value, ExtractionFailure> {
    parse_json(raw)
}

fn parse_fenced(raw: &str) -> Result<Value, ExtractionFailure> {
    let re = match &*FENCED_BLOCK_RE {
        Ok(re) => re,
        Err(e) => {
            warn!("Fenced block pattern unavailable: {}", e);
            return Err(ExtractionFailure::NoFencedBlock);
        }
    };

    let mut last_error = ExtractionFailure::NoFencedBlock;
    for captures in re.captures_iter(raw) {
        let Some(body) = captures.get(1) else {
            continue;
        };
        match parse_json(body.as_str()) {
            Ok(value) => return Ok(value),
            Err(e) => last_error = e,
        }
    }
    Err(last_error)
}

fn parse_braces(raw: &str) -> Result<Value, ExtractionFailure> {
    match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if start < end => parse_json(&raw[start..=end]),
        _ => Err(ExtractionFailure::NoBraces),
    }
}

/// Accepts `{"sections": {...}}` or a flat object of sections
fn sections_from_value(
    value: Value,
    section_order: &[String],
) -> Result<Vec<SummarySection>, ExtractionFailure> {
    let Value::Object(mut object) = value else {
        return Err(ExtractionFailure::NotAnObject);
    };

    let fields: Map<String, Value> = match object.remove("sections") {
        Some(Value::Object(inner)) => inner,
        Some(other) => {
            object.insert("sections".to_string(), other);
            object
        }
        None => object,
    };
    if fields.is_empty() {
        return Err(ExtractionFailure::NoSections);
    }

    let mut sections = Vec::with_capacity(fields.len());
    for name in section_order {
        if let Some(value) = fields.get(name) {
            sections.push(SummarySection {
                name: name.clone(),
                text: render_value(value),
            });
        }
    }

    let mut extra: Vec<(&String, &Value)> = fields
        .iter()
        .filter(|(name, _)| !section_order.contains(*name))
        .collect();
    extra.sort_by(|a, b| a.0.cmp(b.0));
    sections.extend(extra.into_iter().map(|(name, value)| SummarySection {
        name: name.clone(),
        text: render_value(value),
    }));

    Ok(sections)
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => format!("- {}", s),
                other => format!("- {}", other),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> Vec<String> {
        ["Overview", "Decisions", "Action Items"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_direct_json() {
        let raw = r#"{"sections": {"Decisions": "Ship v2.", "Overview": "Release sync."}}"#;
        let extraction = extract_sections(raw, &order());

        assert_eq!(extraction.method, ExtractionMethod::Direct);
        assert_eq!(extraction.sections[0].name, "Overview");
        assert_eq!(extraction.sections[1].text, "Ship v2.");
    }

    #[test]
    fn test_fenced_block() {
        let raw = "Here is the summary:\n```json\n{\"Overview\": \"Weekly sync.\"}\n```\nLet me know!";
        let extraction = extract_sections(raw, &order());

        assert_eq!(extraction.method, ExtractionMethod::Fenced);
        assert_eq!(extraction.sections.len(), 1);
        assert_eq!(extraction.sections[0].text, "Weekly sync.");
    }

    #[test]
    fn test_braces_with_surrounding_prose() {
        let raw = "Sure! {\"Overview\": \"Planning.\"} Hope this helps.";
        let extraction = extract_sections(raw, &order());

        assert_eq!(extraction.method, ExtractionMethod::Braces);
        assert_eq!(extraction.sections[0].text, "Planning.");
    }

    #[test]
    fn test_arrays_render_as_bullets_and_extras_sort_last() {
        let raw = r#"{"Zeta": "z", "Action Items": ["Ann: ship", "Bob: test"], "Alpha": 3}"#;
        let extraction = extract_sections(raw, &order());

        let names: Vec<&str> = extraction.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Action Items", "Alpha", "Zeta"]);
        assert_eq!(extraction.sections[0].text, "- Ann: ship\n- Bob: test");
        assert_eq!(extraction.sections[1].text, "3");
    }

    #[test]
    fn test_fallback_keeps_raw_text() {
        let raw = "The team agreed to ship on Friday.";
        let summary = extract(raw, &order(), SummaryMetadata::default());

        assert_eq!(summary.metadata.extraction_method, ExtractionMethod::Fallback);
        assert_eq!(summary.sections.len(), 1);
        assert_eq!(summary.sections[0].name, FALLBACK_SECTION);
        assert_eq!(summary.sections[0].text, raw);
        assert_eq!(summary.raw_markdown, raw);
    }

    #[test]
    fn test_non_object_and_empty_fall_back() {
        assert_eq!(
            extract_sections("[1, 2]", &order()).method,
            ExtractionMethod::Fallback
        );
        assert_eq!(
            extract_sections("{\"sections\": {}}", &order()).method,
            ExtractionMethod::Fallback
        );
    }

    #[test]
    fn test_structured_json_round_trips() {
        let original = FinalSummary::from_sections(
            vec![
                SummarySection {
                    name: "Overview".to_string(),
                    text: "Quarterly review.".to_string(),
                },
                SummarySection {
                    name: "Action Items".to_string(),
                    text: "- Ann: budget by 3/1".to_string(),
                },
            ],
            SummaryMetadata::default(),
        );

        let again = extract(
            &original.to_structured_json(),
            &order(),
            original.metadata.clone(),
        );
        assert_eq!(again.sections, original.sections);
        assert_eq!(again.raw_markdown, original.raw_markdown);
    }
}
