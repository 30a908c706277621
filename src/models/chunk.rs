use std::ops::Range;

use serde::Serialize;

use super::{Segment, Transcript};

/// A contiguous, time-bounded group of transcript segments summarized as one unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    /// Position of this chunk in the chunk sequence
    pub index: usize,
    /// Start timestamp in seconds (first member's start)
    pub start: f64,
    /// End timestamp in seconds (last member's end)
    pub end: f64,
    /// Half-open range of segment indices into the transcript
    pub segment_range: Range<usize>,
}

impl Chunk {
    /// Duration of this chunk in seconds
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    /// Number of segments in this chunk
    pub fn segment_count(&self) -> usize {
        self.segment_range.len()
    }

    /// Member segments borrowed from the owning transcript
    pub fn segments<'a>(&self, transcript: &'a Transcript) -> &'a [Segment] {
        transcript
            .segments
            .get(self.segment_range.clone())
            .unwrap_or(&[])
    }

    /// Human-readable time range, e.g. `00:30:00 - 01:00:00`
    pub fn time_range(&self) -> String {
        format!("{} - {}", format_clock(self.start), format_clock(self.end))
    }
}

/// Summary text produced for one chunk during the map phase
#[derive(Debug, Clone, PartialEq)]
pub struct PartialSummary {
    /// Index of the originating chunk
    pub chunk_index: usize,
    /// Time range of the originating chunk
    pub time_range: String,
    /// Model output for the chunk
    pub text: String,
}

/// Format seconds as HH:MM:SS
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}
