//! Bernoulli emission helpers for binary outcome sequences.
//!
//! A make/miss observation `x ∈ {0, 1}` under success probability `p` has
//! `log P(x | p) = x·ln p + (1 - x)·ln(1 - p)`. Probabilities are floored
//! away from 0 and 1 so a single surprising outcome never produces -inf.

use serde::{Deserialize, Serialize};

use super::stable::ln_floored;

/// Clamp a probability into `[floor, 1 - floor]`.
pub fn clamp_probability(p: f64, floor: f64) -> f64 {
    if p.is_nan() {
        return 0.5;
    }
    p.clamp(floor, 1.0 - floor)
}

/// Log-probability of a binary outcome under success probability `p`.
pub fn log_pmf(outcome: u8, p: f64, floor: f64) -> f64 {
    if outcome == 0 {
        ln_floored(1.0 - p, floor)
    } else {
        ln_floored(p, floor)
    }
}

/// Pair of log-probabilities `[ln P(miss), ln P(make)]` for one state.
pub fn log_emission_pair(p: f64, floor: f64) -> [f64; 2] {
    [log_pmf(0, p, floor), log_pmf(1, p, floor)]
}

/// Running success/trial counts for a group of binary outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BernoulliCounts {
    /// Number of observations.
    pub trials: u64,
    /// Number of observations equal to 1.
    pub successes: u64,
}

impl BernoulliCounts {
    /// Record one outcome.
    pub fn observe(&mut self, outcome: u8) {
        self.trials += 1;
        if outcome != 0 {
            self.successes += 1;
        }
    }

    /// Build counts from a sequence of outcomes.
    pub fn from_outcomes<'a, I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = &'a u8>,
    {
        let mut counts = Self::default();
        for &o in outcomes {
            counts.observe(o);
        }
        counts
    }

    /// Empirical success rate, or None when no trials were observed.
    pub fn rate(&self) -> Option<f64> {
        if self.trials == 0 {
            None
        } else {
            Some(self.successes as f64 / self.trials as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_probability_respects_floor() {
        assert_eq!(clamp_probability(0.0, 1e-6), 1e-6);
        assert_eq!(clamp_probability(1.0, 1e-6), 1.0 - 1e-6);
        assert_eq!(clamp_probability(0.3, 1e-6), 0.3);
        assert_eq!(clamp_probability(f64::NAN, 1e-6), 0.5);
    }

    #[test]
    fn log_pmf_matches_direct_formula() {
        let p: f64 = 0.3;
        assert!((log_pmf(1, p, 1e-12) - p.ln()).abs() < 1e-15);
        assert!((log_pmf(0, p, 1e-12) - (1.0 - p).ln()).abs() < 1e-15);
    }

    #[test]
    fn log_pmf_is_finite_at_extremes() {
        assert!(log_pmf(0, 1.0, 1e-10).is_finite());
        assert!(log_pmf(1, 0.0, 1e-10).is_finite());
    }

    #[test]
    fn emission_pair_sums_to_one() {
        let [miss, make] = log_emission_pair(0.42, 1e-12);
        assert!((miss.exp() + make.exp() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn counts_rate() {
        let counts = BernoulliCounts::from_outcomes(&[1, 0, 1, 1]);
        assert_eq!(counts.trials, 4);
        assert_eq!(counts.successes, 3);
        assert_eq!(counts.rate(), Some(0.75));
        assert_eq!(BernoulliCounts::default().rate(), None);
    }
}
