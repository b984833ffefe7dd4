//! Numerically stable primitives for log-domain sequence models.

/// Stable log(sum(exp(values))).
///
/// Returns NEG_INFINITY for empty input or all -inf inputs.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }
    if values.iter().any(|v| v.is_nan()) {
        return f64::NAN;
    }
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    if max == f64::INFINITY {
        return f64::INFINITY;
    }
    let mut sum = 0.0;
    for v in values {
        sum += (*v - max).exp();
    }
    max + sum.ln()
}

/// Natural log of a probability, floored so that zero never yields -inf.
pub fn ln_floored(p: f64, floor: f64) -> f64 {
    p.max(floor).ln()
}

/// Normalize non-negative weights in place so they sum to one.
///
/// Returns the original sum, or None (leaving `values` untouched) when the
/// sum is zero, negative, or not finite.
pub fn normalize(values: &mut [f64]) -> Option<f64> {
    let sum: f64 = values.iter().sum();
    if !(sum.is_finite() && sum > 0.0) {
        return None;
    }
    for v in values.iter_mut() {
        *v /= sum;
    }
    Some(sum)
}

/// Convert log-weights into a normalized probability vector in place.
///
/// Returns the log normalizer `log_sum_exp(values)`. When every weight is
/// -inf the vector becomes uniform and -inf is returned.
pub fn normalize_log(values: &mut [f64]) -> f64 {
    let log_z = log_sum_exp(values);
    if !log_z.is_finite() {
        let n = values.len().max(1) as f64;
        for v in values.iter_mut() {
            *v = 1.0 / n;
        }
        return log_z;
    }
    for v in values.iter_mut() {
        *v = (*v - log_z).exp();
    }
    log_z
}

/// Index of the largest value, ties resolved to the lowest index.
///
/// NaN entries never win. Returns None for empty input or all-NaN input.
pub fn argmax_first(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}
