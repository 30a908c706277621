use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::llm::EstimateSource;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Pipeline phase an error is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Chunk,
    Map,
    Reduce,
    Refine,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Chunk => "chunk",
            Self::Map => "map",
            Self::Reduce => "reduce",
            Self::Refine => "refine",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Malformed transcript or chunking parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChunkingError {
    #[error("chunk size must be a positive, finite number of seconds (got {0})")]
    InvalidTargetSeconds(f64),

    #[error("segment {index} has a non-finite timestamp")]
    NonFiniteTimestamp { index: usize },

    #[error("segment {index} ends before it starts ({start}s > {end}s)")]
    NegativeDuration { index: usize, start: f64, end: f64 },

    #[error("segment {index} starts at {start}s, before the previous segment at {previous_start}s")]
    OutOfOrder {
        index: usize,
        start: f64,
        previous_start: f64,
    },
}

/// Terminal failure reported by a provider client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Rate limits, timeouts and overloads; retried by the collaborator layer
    #[error("transient provider error: {0}")]
    Transient(String),

    /// Bad credentials, rejected requests; never retried
    #[error("fatal provider error: {0}")]
    Fatal(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Why a refinement pass stopped. Always recovered inside the refiner.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RefinementError {
    #[error("refinement pass {pass} failed: {error}")]
    Provider {
        pass: u32,
        #[source]
        error: ProviderError,
    },

    #[error(
        "refinement pass {pass} rejected by preflight: {input_tokens} input + {max_output_tokens} output + {safety_margin} margin > {context_window} context window"
    )]
    BudgetExceeded {
        pass: u32,
        input_tokens: usize,
        max_output_tokens: usize,
        safety_margin: usize,
        context_window: usize,
    },

    #[error("refinement pass {pass} returned an empty response")]
    EmptyResponse { pass: u32 },
}

/// Why one structured-extraction attempt did not produce sections. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionFailure {
    #[error("not valid JSON: {0}")]
    InvalidJson(String),

    #[error("no fenced code block found")]
    NoFencedBlock,

    #[error("no brace-delimited object found")]
    NoBraces,

    #[error("JSON value is not an object")]
    NotAnObject,

    #[error("JSON object contains no sections")]
    NoSections,
}

/// Errors that end a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("chunk phase: {0}")]
    Chunking(#[from] ChunkingError),

    #[error(
        "token budget exceeded in {phase} phase{}: {input_tokens} input tokens ({estimate} estimate) + {max_output_tokens} output + {safety_margin} margin > {context_window} context window",
        chunk_suffix(.chunk_index)
    )]
    TokenBudgetExceeded {
        phase: Phase,
        chunk_index: Option<usize>,
        input_tokens: usize,
        max_output_tokens: usize,
        safety_margin: usize,
        context_window: usize,
        estimate: EstimateSource,
    },

    #[error("provider failed in {phase} phase{}: {error}", chunk_suffix(.chunk_index))]
    Provider {
        phase: Phase,
        chunk_index: Option<usize>,
        #[source]
        error: ProviderError,
    },

    #[error("unknown template '{name}' (available: {available})")]
    UnknownTemplate { name: String, available: String },

    #[error("run cancelled during {phase} phase")]
    Cancelled { phase: Phase },
}

impl PipelineError {
    /// Phase the failure is attributed to
    pub fn phase(&self) -> Phase {
        match self {
            Self::Chunking(_) | Self::UnknownTemplate { .. } => Phase::Chunk,
            Self::TokenBudgetExceeded { phase, .. }
            | Self::Provider { phase, .. }
            | Self::Cancelled { phase } => *phase,
        }
    }

    pub fn is_budget_exceeded(&self) -> bool {
        matches!(self, Self::TokenBudgetExceeded { .. })
    }
}

fn chunk_suffix(chunk_index: &Option<usize>) -> String {
    match chunk_index {
        Some(index) => format!(" (chunk {})", index),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_error_message_names_phase_and_values() {
        let err = PipelineError::TokenBudgetExceeded {
            phase: Phase::Map,
            chunk_index: Some(3),
            input_tokens: 9_000,
            max_output_tokens: 1_000,
            safety_margin: 500,
            context_window: 8_000,
            estimate: EstimateSource::Local,
        };

        let message = err.to_string();
        assert!(message.contains("map phase (chunk 3)"));
        assert!(message.contains("9000 input tokens (local estimate)"));
        assert!(message.contains("8000 context window"));
        assert_eq!(err.phase(), Phase::Map);
        assert!(err.is_budget_exceeded());
    }

    #[test]
    fn test_provider_error_without_chunk() {
        let err = PipelineError::Provider {
            phase: Phase::Reduce,
            chunk_index: None,
            error: ProviderError::Fatal("401 Unauthorized".to_string()),
        };

        assert_eq!(
            err.to_string(),
            "provider failed in reduce phase: fatal provider error: 401 Unauthorized"
        );
    }

    #[test]
    fn test_chunking_error_is_chunk_phase() {
        let err: PipelineError = ChunkingError::InvalidTargetSeconds(0.0).into();
        assert_eq!(err.phase(), Phase::Chunk);
    }
}
