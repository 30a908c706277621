use tracing::debug;

use crate::error::ChunkingError;
use crate::models::{Chunk, Segment, Transcript};

/// Default chunk length: 30 minutes
pub const DEFAULT_CHUNK_SECONDS: f64 = 1_800.0;

/// Stage 0: partition a transcript into time-bounded chunks
///
/// Segments are accumulated in order; a chunk closes once the current
/// segment's end is `target_seconds` or more past the chunk start. Segments
/// are never split. A segment longer than `target_seconds` closes any open
/// chunk and stands alone. The last chunk may be short. An empty transcript
/// yields no chunks.
pub fn chunk_transcript(
    transcript: &Transcript,
    target_seconds: f64,
) -> Result<Vec<Chunk>, ChunkingError> {
    if !target_seconds.is_finite() || target_seconds <= 0.0 {
        return Err(ChunkingError::InvalidTargetSeconds(target_seconds));
    }
    validate_segments(&transcript.segments)?;

    let segments = &transcript.segments;
    let mut chunks = Vec::new();
    let mut open: Option<usize> = None;

    for (i, segment) in segments.iter().enumerate() {
        if let Some(first) = open {
            if segment.duration() > target_seconds {
                chunks.push(make_chunk(chunks.len(), segments, first, i));
                open = None;
            }
        }

        let first = *open.get_or_insert(i);
        if segment.end - segments[first].start >= target_seconds {
            chunks.push(make_chunk(chunks.len(), segments, first, i + 1));
            open = None;
        }
    }

    if let Some(first) = open {
        chunks.push(make_chunk(chunks.len(), segments, first, segments.len()));
    }

    debug!(
        "Chunked {} segments into {} chunks of ~{}s",
        segments.len(),
        chunks.len(),
        target_seconds
    );
    Ok(chunks)
}

fn validate_segments(segments: &[Segment]) -> Result<(), ChunkingError> {
    let mut previous_start: Option<f64> = None;
    for (index, segment) in segments.iter().enumerate() {
        if !segment.start.is_finite() || !segment.end.is_finite() {
            return Err(ChunkingError::NonFiniteTimestamp { index });
        }
        if segment.end < segment.start {
            return Err(ChunkingError::NegativeDuration {
                index,
                start: segment.start,
                end: segment.end,
            });
        }
        if let Some(previous_start) = previous_start {
            if segment.start < previous_start {
                return Err(ChunkingError::OutOfOrder {
                    index,
                    start: segment.start,
                    previous_start,
                });
            }
        }
        previous_start = Some(segment.start);
    }
    Ok(())
}

fn make_chunk(index: usize, segments: &[Segment], first: usize, end: usize) -> Chunk {
    let members = &segments[first..end];
    let start = members.first().map(|s| s.start).unwrap_or_default();
    let end_time = members
        .iter()
        .map(|s| s.end)
        .fold(start, f64::max);

    Chunk {
        index,
        start,
        end: end_time,
        segment_range: first..end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(count: usize, seconds: f64) -> Transcript {
        Transcript::new(
            (0..count)
                .map(|i| {
                    let start = i as f64 * seconds;
                    Segment::new(start, start + seconds, format!("S{}", i % 3), format!("segment {}", i))
                })
                .collect(),
        )
    }

    fn assert_reconstructs(transcript: &Transcript, chunks: &[Chunk]) {
        let mut next = 0;
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert_eq!(chunk.segment_range.start, next);
            assert!(chunk.segment_count() > 0);
            next = chunk.segment_range.end;
        }
        assert_eq!(next, transcript.len());

        let rebuilt: Vec<Segment> = chunks
            .iter()
            .flat_map(|c| c.segments(transcript).iter().cloned())
            .collect();
        assert_eq!(rebuilt, transcript.segments);
    }

    #[test]
    fn test_three_hours_of_ten_minute_segments() {
        let transcript = uniform(18, 600.0);
        let chunks = chunk_transcript(&transcript, 1_800.0).unwrap();

        assert_eq!(chunks.len(), 6);
        assert_eq!(chunks[0].time_range(), "00:00:00 - 00:30:00");
        assert_eq!(chunks[5].time_range(), "02:30:00 - 03:00:00");
        assert_reconstructs(&transcript, &chunks);
    }

    #[test]
    fn test_short_final_chunk_is_emitted() {
        let transcript = uniform(7, 600.0);
        let chunks = chunk_transcript(&transcript, 1_800.0).unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].segment_count(), 1);
        assert_reconstructs(&transcript, &chunks);
    }

    #[test]
    fn test_reconstruction_across_sizes() {
        let transcript = Transcript::new(
            [
                (0.0, 4.0),
                (4.5, 9.0),
                (9.0, 30.0),
                (31.0, 32.0),
                (32.0, 95.0),
                (95.0, 96.0),
                (100.0, 140.0),
            ]
            .iter()
            .enumerate()
            .map(|(i, &(s, e))| Segment::new(s, e, "A", format!("t{}", i)))
            .collect(),
        );

        for target in [1.0, 5.0, 10.0, 30.0, 60.0, 1_000.0] {
            let chunks = chunk_transcript(&transcript, target).unwrap();
            assert_reconstructs(&transcript, &chunks);
        }
    }

    #[test]
    fn test_oversized_segment_stands_alone() {
        let transcript = Transcript::new(vec![
            Segment::new(0.0, 10.0, "A", "short"),
            Segment::new(10.0, 200.0, "B", "long monologue"),
            Segment::new(200.0, 210.0, "A", "short again"),
        ]);

        let chunks = chunk_transcript(&transcript, 60.0).unwrap();
        let ranges: Vec<_> = chunks.iter().map(|c| c.segment_range.clone()).collect();
        assert_eq!(ranges, vec![0..1, 1..2, 2..3]);
        assert_eq!(chunks[1].duration(), 190.0);
    }

    #[test]
    fn test_segment_of_exactly_target_length_joins_open_chunk() {
        let transcript = Transcript::new(vec![
            Segment::new(0.0, 100.0, "A", "intro"),
            Segment::new(100.0, 700.0, "B", "ten minute update"),
        ]);

        let chunks = chunk_transcript(&transcript, 600.0).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].segment_range, 0..2);
    }

    #[test]
    fn test_deterministic() {
        let transcript = uniform(25, 97.0);
        let first = chunk_transcript(&transcript, 600.0).unwrap();
        let second = chunk_transcript(&transcript, 600.0).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_transcript_yields_no_chunks() {
        let chunks = chunk_transcript(&Transcript::default(), 60.0).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_rejects_malformed_input() {
        let transcript = uniform(2, 10.0);
        assert_eq!(
            chunk_transcript(&transcript, 0.0),
            Err(ChunkingError::InvalidTargetSeconds(0.0))
        );
        assert!(chunk_transcript(&transcript, f64::NAN).is_err());

        let backwards = Transcript::new(vec![Segment::new(5.0, 4.0, "A", "x")]);
        assert!(matches!(
            chunk_transcript(&backwards, 60.0),
            Err(ChunkingError::NegativeDuration { index: 0, .. })
        ));

        let out_of_order = Transcript::new(vec![
            Segment::new(10.0, 12.0, "A", "x"),
            Segment::new(5.0, 6.0, "B", "y"),
        ]);
        assert!(matches!(
            chunk_transcript(&out_of_order, 60.0),
            Err(ChunkingError::OutOfOrder { index: 1, .. })
        ));

        let infinite = Transcript::new(vec![Segment::new(0.0, f64::INFINITY, "A", "x")]);
        assert_eq!(
            chunk_transcript(&infinite, 60.0),
            Err(ChunkingError::NonFiniteTimestamp { index: 0 })
        );
    }
}
