use serde::{Deserialize, Serialize};

/// A single recognized word with timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    /// Start timestamp in seconds
    pub start: f64,
    /// End timestamp in seconds
    pub end: f64,
    /// The recognized text
    pub text: String,
    /// Transcription accuracy confidence (0-1)
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

/// A spoken segment attributed to one speaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Start timestamp in seconds
    pub start: f64,
    /// End timestamp in seconds (always >= start)
    pub end: f64,
    /// Speaker label as produced by the transcriber
    pub speaker: String,
    /// Segment text
    pub text: String,
    /// Word-level timing, if the transcriber produced it
    #[serde(default)]
    pub words: Vec<Word>,
}

impl Segment {
    pub fn new(start: f64, end: f64, speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            speaker: speaker.into(),
            text: text.into(),
            words: Vec::new(),
        }
    }

    /// Duration of this segment in seconds
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// A speaker-attributed transcript, chronological by segment start
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    /// All segments in order
    pub segments: Vec<Segment>,
}

impl Transcript {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Total duration in seconds, from the first segment start to the latest segment end
    pub fn duration(&self) -> f64 {
        match self.segments.first() {
            Some(first) => {
                let end = self.segments.iter().map(|s| s.end).fold(first.end, f64::max);
                (end - first.start).max(0.0)
            }
            None => 0.0,
        }
    }

    /// Unique speaker labels in order of first appearance
    pub fn speakers(&self) -> Vec<&str> {
        let mut speakers: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if !speakers.contains(&segment.speaker.as_str()) {
                speakers.push(&segment.speaker);
            }
        }
        speakers
    }

    /// All segment text joined with spaces
    pub fn full_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
