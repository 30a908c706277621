use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::models::{Template, TemplateRegistry, Transcript};

/// Keywords that indicate a template category
#[derive(Debug, Clone)]
pub struct KeywordCategory {
    /// Template chosen when this category wins
    pub template: String,
    /// Words and phrases counted case-insensitively on word boundaries
    pub keywords: Vec<String>,
}

impl KeywordCategory {
    pub fn new(template: &str, keywords: &[&str]) -> Self {
        Self {
            template: template.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Configuration for keyword-based template selection
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    /// Matches a category needs before it can beat the default template
    pub min_matches: usize,
    /// Non-default categories; keyword sets are disjoint
    pub categories: Vec<KeywordCategory>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            min_matches: 2,
            categories: vec![
                KeywordCategory::new(
                    "procedural",
                    &[
                        "step by step",
                        "step-by-step",
                        "configure",
                        "configuration",
                        "setup",
                        "set up",
                        "install",
                        "installation",
                        "how to",
                        "tutorial",
                        "walkthrough",
                        "walk through",
                        "click on",
                        "navigate to",
                        "command line",
                    ],
                ),
                KeywordCategory::new(
                    "decision",
                    &[
                        "decide",
                        "decided",
                        "decision",
                        "approve",
                        "approved",
                        "sign off",
                        "vote",
                        "agreed",
                        "go with",
                        "trade-off",
                        "tradeoff",
                        "pros and cons",
                        "final call",
                        "green light",
                    ],
                ),
                KeywordCategory::new(
                    "ideation",
                    &[
                        "brainstorm",
                        "brainstorming",
                        "idea",
                        "ideas",
                        "what if",
                        "imagine",
                        "concept",
                        "blue sky",
                        "riff",
                        "wild card",
                        "moonshot",
                        "pitch",
                    ],
                ),
            ],
        }
    }
}

/// How the template for a run was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    /// Named explicitly by the caller
    Override,
    /// Won keyword scoring
    Keywords,
    /// No category scored high enough, or the top scores tied
    Default,
}

/// Result of template selection
#[derive(Debug, Clone)]
pub struct TemplateSelection {
    pub template: Template,
    pub reason: SelectionReason,
    /// Match count per category, in configuration order
    pub scores: Vec<(String, usize)>,
}

/// Count keyword occurrences per category
pub fn score_categories(text: &str, config: &SelectorConfig) -> Vec<(String, usize)> {
    config
        .categories
        .iter()
        .map(|category| (category.template.clone(), count_matches(text, &category.keywords)))
        .collect()
}

fn count_matches(text: &str, keywords: &[String]) -> usize {
    if keywords.is_empty() {
        return 0;
    }
    let alternatives: Vec<String> = keywords
        .iter()
        .map(|k| {
            k.split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
        })
        .collect();
    let pattern = format!(r"(?i)\b(?:{})\b", alternatives.join("|"));

    match Regex::new(&pattern) {
        Ok(re) => re.find_iter(text).count(),
        Err(e) => {
            warn!("Invalid keyword pattern {:?}: {}", pattern, e);
            0
        }
    }
}

/// Choose the template for a run.
///
/// An override is used verbatim. Otherwise the transcript text is scored
/// against each category; the single highest score at or above
/// `min_matches` wins. Ties and low scores use the default template.
pub fn select_template(
    transcript: &Transcript,
    override_name: Option<&str>,
    registry: &TemplateRegistry,
    config: &SelectorConfig,
) -> PipelineResult<TemplateSelection> {
    if let Some(name) = override_name {
        let template = registry
            .get(name)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownTemplate {
                name: name.to_string(),
                available: registry.names().collect::<Vec<_>>().join(", "),
            })?;
        info!("Using template '{}' (override)", template.name);
        return Ok(TemplateSelection {
            template,
            reason: SelectionReason::Override,
            scores: Vec::new(),
        });
    }

    let scores = score_categories(&transcript.full_text(), config);
    debug!("Template keyword scores: {:?}", scores);

    let best = scores.iter().map(|(_, score)| *score).max().unwrap_or(0);
    let leaders: Vec<&str> = scores
        .iter()
        .filter(|(_, score)| *score == best)
        .map(|(name, _)| name.as_str())
        .collect();

    let winner = if best >= config.min_matches && leaders.len() == 1 {
        match registry.get(leaders[0]) {
            Some(template) => Some(template.clone()),
            None => {
                warn!("Template '{}' scored highest but is not registered", leaders[0]);
                None
            }
        }
    } else {
        None
    };

    let selection = match winner {
        Some(template) => TemplateSelection {
            template,
            reason: SelectionReason::Keywords,
            scores,
        },
        None => TemplateSelection {
            template: registry.default_template(),
            reason: SelectionReason::Default,
            scores,
        },
    };

    info!(
        "Using template '{}' ({:?})",
        selection.template.name, selection.reason
    );
    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DEFAULT_TEMPLATE, Segment};

    fn transcript(texts: &[&str]) -> Transcript {
        Transcript::new(
            texts
                .iter()
                .enumerate()
                .map(|(i, t)| Segment::new(i as f64 * 10.0, i as f64 * 10.0 + 9.0, "A", *t))
                .collect(),
        )
    }

    fn select(t: &Transcript, override_name: Option<&str>) -> PipelineResult<TemplateSelection> {
        select_template(t, override_name, &TemplateRegistry::builtin(), &SelectorConfig::default())
    }

    #[test]
    fn test_procedural_keywords_select_procedural() {
        let t = transcript(&[
            "Let's go through this step by step.",
            "First we configure the proxy.",
            "Then the setup wizard asks for a token.",
        ]);

        let selection = select(&t, None).unwrap();
        assert_eq!(selection.template.name, "procedural");
        assert_eq!(selection.reason, SelectionReason::Keywords);
        assert_eq!(selection.scores[0], ("procedural".to_string(), 3));
    }

    #[test]
    fn test_below_threshold_uses_default() {
        let t = transcript(&["We need to configure nothing else today."]);

        let selection = select(&t, None).unwrap();
        assert_eq!(selection.template.name, DEFAULT_TEMPLATE);
        assert_eq!(selection.reason, SelectionReason::Default);
    }

    #[test]
    fn test_tie_uses_default() {
        let t = transcript(&[
            "We decided to configure it.",
            "The decision was to install it.",
        ]);

        let selection = select(&t, None).unwrap();
        assert_eq!(selection.template.name, DEFAULT_TEMPLATE);
    }

    #[test]
    fn test_override_wins_over_keywords() {
        let t = transcript(&["step by step configure setup install"]);

        let selection = select(&t, Some("ideation")).unwrap();
        assert_eq!(selection.template.name, "ideation");
        assert_eq!(selection.reason, SelectionReason::Override);
    }

    #[test]
    fn test_unknown_override_is_an_error() {
        let t = transcript(&["hello"]);

        let err = select(&t, Some("retro")).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownTemplate { ref name, .. } if name == "retro"));
    }

    #[test]
    fn test_keywords_match_on_word_boundaries() {
        let config = SelectorConfig::default();
        let scores = score_categories("The ideas are idealistic; Step  By\nStep.", &config);

        let ideation = scores.iter().find(|(n, _)| n == "ideation").unwrap().1;
        let procedural = scores.iter().find(|(n, _)| n == "procedural").unwrap().1;
        assert_eq!(ideation, 1);
        assert_eq!(procedural, 1);
    }

    #[test]
    fn test_default_keyword_sets_are_disjoint() {
        let config = SelectorConfig::default();
        let mut seen = std::collections::HashSet::new();
        for category in &config.categories {
            for keyword in &category.keywords {
                assert!(seen.insert(keyword.to_lowercase()), "duplicate keyword {}", keyword);
            }
        }
    }
}
