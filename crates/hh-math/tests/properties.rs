//! Property-based tests for hh-math numerical functions.
//!
//! Uses proptest to verify mathematical properties hold across many random inputs.

use hh_math::bernoulli::{clamp_probability, log_emission_pair, BernoulliCounts};
use hh_math::{argmax_first, log_sum_exp, normalize, normalize_log};
use proptest::prelude::*;

/// Tolerance for floating point comparisons.
const TOL: f64 = 1e-10;

/// Helper to check approximate equality.
fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    if a.is_nan() && b.is_nan() {
        return true;
    }
    if a.is_nan() || b.is_nan() {
        return false;
    }
    if a.is_infinite() && b.is_infinite() {
        return a.signum() == b.signum();
    }
    if a.is_infinite() || b.is_infinite() {
        return false;
    }
    (a - b).abs() <= tol.max(tol * a.abs().max(b.abs()))
}

// ============================================================================
// log_sum_exp properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// log_sum_exp is commutative: order doesn't matter.
    #[test]
    fn log_sum_exp_commutative(a in -100.0..100.0f64, b in -100.0..100.0f64) {
        let ab = log_sum_exp(&[a, b]);
        let ba = log_sum_exp(&[b, a]);
        prop_assert!(approx_eq(ab, ba, TOL), "lse([{},{}])={} != lse([{},{}])={}", a, b, ab, b, a, ba);
    }

    /// log_sum_exp is associative: grouping doesn't matter.
    #[test]
    fn log_sum_exp_associative(a in -50.0..50.0f64, b in -50.0..50.0f64, c in -50.0..50.0f64) {
        let direct = log_sum_exp(&[a, b, c]);
        let grouped = log_sum_exp(&[log_sum_exp(&[a, b]), c]);
        prop_assert!(approx_eq(direct, grouped, TOL));
    }

    /// log_sum_exp numerical stability: no underflow with very negative values.
    #[test]
    fn log_sum_exp_no_underflow(a in -900.0..-700.0f64, b in -900.0..-700.0f64) {
        let result = log_sum_exp(&[a, b]);
        prop_assert!(result.is_finite(), "lse([{},{}]) = {} should stay finite", a, b, result);
        prop_assert!(result >= a.max(b) - TOL);
    }
}

// ============================================================================
// normalization properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// normalize produces a probability vector.
    #[test]
    fn normalize_sums_to_one(values in prop::collection::vec(0.001..100.0f64, 1..8)) {
        let mut v = values.clone();
        prop_assert!(normalize(&mut v).is_some());
        let sum: f64 = v.iter().sum();
        prop_assert!(approx_eq(sum, 1.0, 1e-12));
        prop_assert!(v.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    /// normalize_log is shift-invariant in its output distribution.
    #[test]
    fn normalize_log_shift_invariant(
        values in prop::collection::vec(-50.0..50.0f64, 2..6),
        shift in -200.0..200.0f64,
    ) {
        let mut a = values.clone();
        let mut b: Vec<f64> = values.iter().map(|v| v + shift).collect();
        normalize_log(&mut a);
        normalize_log(&mut b);
        for (x, y) in a.iter().zip(b.iter()) {
            prop_assert!(approx_eq(*x, *y, 1e-9));
        }
    }

    /// argmax_first never returns an index whose value is beaten by an earlier tie.
    #[test]
    fn argmax_first_is_lowest_maximum(values in prop::collection::vec(0u8..4, 1..10)) {
        let floats: Vec<f64> = values.iter().map(|&v| v as f64).collect();
        let idx = argmax_first(&floats).unwrap();
        let max = floats.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        prop_assert_eq!(floats[idx], max);
        prop_assert!(floats[..idx].iter().all(|&v| v < max));
    }
}

// ============================================================================
// Bernoulli properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Emission pair is a valid distribution after clamping.
    #[test]
    fn emission_pair_is_distribution(p in 0.0..=1.0f64) {
        let floor = 1e-10;
        let [miss, make] = log_emission_pair(clamp_probability(p, floor), floor);
        prop_assert!(miss.is_finite() && make.is_finite());
        prop_assert!(approx_eq(miss.exp() + make.exp(), 1.0, 1e-9));
    }

    /// Rate equals the arithmetic mean of the outcomes.
    #[test]
    fn counts_rate_is_mean(outcomes in prop::collection::vec(0u8..=1, 1..200)) {
        let counts = BernoulliCounts::from_outcomes(&outcomes);
        let mean = outcomes.iter().map(|&o| o as f64).sum::<f64>() / outcomes.len() as f64;
        prop_assert!(approx_eq(counts.rate().unwrap(), mean, 1e-12));
    }
}
