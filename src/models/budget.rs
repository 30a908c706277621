use serde::{Deserialize, Serialize};

/// Context-window budget for a single model call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBudget {
    /// Total tokens the model accepts (input + output)
    pub context_window: usize,
    /// Tokens reserved for the model's response
    pub max_output_tokens: usize,
    /// Extra headroom for estimation error and framing
    pub safety_margin: usize,
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self {
            context_window: 200_000,
            max_output_tokens: 4_096,
            safety_margin: 1_024,
        }
    }
}

impl TokenBudget {
    pub fn new(context_window: usize, max_output_tokens: usize, safety_margin: usize) -> Self {
        Self {
            context_window,
            max_output_tokens,
            safety_margin,
        }
    }

    /// Whether a prompt of `input_tokens` leaves room for the reserved output and margin.
    ///
    /// An overflowing sum never fits.
    pub fn fits(&self, input_tokens: usize) -> bool {
        input_tokens
            .checked_add(self.max_output_tokens)
            .and_then(|sum| sum.checked_add(self.safety_margin))
            .is_some_and(|total| total <= self.context_window)
    }

    /// Largest input that still fits, zero if nothing does
    pub fn max_input_tokens(&self) -> usize {
        self.context_window
            .saturating_sub(self.max_output_tokens)
            .saturating_sub(self.safety_margin)
    }

    /// Same budget with the output reservation capped at `limit`
    pub fn with_output_cap(&self, limit: usize) -> Self {
        Self {
            max_output_tokens: self.max_output_tokens.min(limit),
            ..*self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fits_boundary() {
        let budget = TokenBudget::new(1_000, 200, 100);
        assert!(budget.fits(700));
        assert!(!budget.fits(701));
        assert_eq!(budget.max_input_tokens(), 700);
    }

    #[test]
    fn test_fits_monotonic_in_output_and_margin() {
        let inputs = [0usize, 1, 50, 499, 500, 501, 900, 1_000, usize::MAX];
        let steps = [0usize, 1, 10, 100, 1_000, usize::MAX];

        for &input in &inputs {
            for &output in &steps {
                for &margin in &steps {
                    let base = TokenBudget::new(1_000, output, margin);
                    for &extra in &steps {
                        let more_output = TokenBudget {
                            max_output_tokens: output.saturating_add(extra),
                            ..base
                        };
                        let more_margin = TokenBudget {
                            safety_margin: margin.saturating_add(extra),
                            ..base
                        };
                        if !base.fits(input) {
                            assert!(!more_output.fits(input));
                            assert!(!more_margin.fits(input));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_overflow_never_fits() {
        let budget = TokenBudget::new(usize::MAX, usize::MAX, 1);
        assert!(!budget.fits(1));
    }

    #[test]
    fn test_with_output_cap() {
        let budget = TokenBudget::new(10_000, 4_000, 500).with_output_cap(1_500);
        assert_eq!(budget.max_output_tokens, 1_500);
        assert_eq!(budget.safety_margin, 500);
    }
}
