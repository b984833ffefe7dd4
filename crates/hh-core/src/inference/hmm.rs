//! Discrete-output hidden Markov model over binary outcomes.
//!
//! # Model
//!
//! - Hidden states: `S_t ∈ {0, .., N-1}`
//! - Start: `P(S_0 = i) = π_i`
//! - Transitions: `P(S_{t+1} = j | S_t = i) = A_ij`
//! - Emissions: `P(x_t = 1 | S_t = i) = b_i`, `x_t ∈ {miss=0, make=1}`
//!
//! All recursions run in log space. Every probability is floored at
//! `min_probability` so an outcome the current parameters consider
//! impossible never drives the likelihood to -inf.
//!
//! Fitting is Baum-Welch EM. Decoding is Viterbi: one global most-probable
//! path, not a per-position posterior argmax.

use hh_math::bernoulli::{clamp_probability, log_emission_pair};
use hh_math::{argmax_first, ln_floored, log_sum_exp, normalize, normalize_log};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Estimator misuse. None of these arise from valid prepared sequences.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimatorError {
    #[error("cannot fit an empty outcome sequence")]
    EmptySequence,

    #[error("invalid state count {0}: need between 1 and 255 states")]
    InvalidStateCount(usize),

    #[error("outcome {value} at position {position} is outside {{0, 1}}")]
    InvalidSymbol { position: usize, value: u8 },

    #[error("invalid model parameters: {0}")]
    InvalidParameters(String),

    #[error("log-likelihood became non-finite at iteration {iteration}")]
    NonFiniteLikelihood { iteration: usize },
}

impl From<EstimatorError> for hh_common::Error {
    fn from(err: EstimatorError) -> Self {
        match err {
            EstimatorError::NonFiniteLikelihood { .. } => {
                hh_common::Error::NumericalInstability(err.to_string())
            }
            other => hh_common::Error::Inference(other.to_string()),
        }
    }
}

/// How a Baum-Welch run ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    /// Number of re-estimation steps performed.
    pub iterations: usize,
    /// True when the gain dropped below tolerance before the cap.
    pub converged: bool,
    /// Log-likelihood of the returned parameters.
    pub log_likelihood: f64,
}

/// Parameters of a binary-emission HMM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryHmm {
    /// Start distribution, length N.
    pub initial: Vec<f64>,
    /// Row-stochastic N×N transition matrix.
    pub transition: Vec<Vec<f64>>,
    /// P(make) per state, length N.
    pub emission_make: Vec<f64>,
    #[serde(skip, default = "default_floor")]
    min_probability: f64,
}

fn default_floor() -> f64 {
    1e-10
}

/// Log-space view of the parameters, rebuilt once per E-step.
struct LogParams {
    initial: Vec<f64>,
    transition: Vec<Vec<f64>>,
    emission: Vec<[f64; 2]>,
}

/// Forward/backward lattice stored row-major as `[t * n + i]`.
struct Lattice {
    n: usize,
    values: Vec<f64>,
}

impl Lattice {
    fn new(len: usize, n: usize) -> Self {
        Self {
            n,
            values: vec![0.0; len * n],
        }
    }

    fn row(&self, t: usize) -> &[f64] {
        &self.values[t * self.n..(t + 1) * self.n]
    }

    fn row_mut(&mut self, t: usize) -> &mut [f64] {
        &mut self.values[t * self.n..(t + 1) * self.n]
    }
}

impl BinaryHmm {
    /// Build a model from explicit parameters.
    pub fn new(
        initial: Vec<f64>,
        transition: Vec<Vec<f64>>,
        emission_make: Vec<f64>,
        min_probability: f64,
    ) -> Result<Self, EstimatorError> {
        let n = initial.len();
        if n == 0 || n > usize::from(u8::MAX) {
            return Err(EstimatorError::InvalidStateCount(n));
        }
        if !(min_probability > 0.0 && min_probability < 0.5) {
            return Err(EstimatorError::InvalidParameters(format!(
                "min_probability {} outside (0, 0.5)",
                min_probability
            )));
        }
        if transition.len() != n || transition.iter().any(|row| row.len() != n) {
            return Err(EstimatorError::InvalidParameters(format!(
                "transition matrix must be {}x{}",
                n, n
            )));
        }
        if emission_make.len() != n {
            return Err(EstimatorError::InvalidParameters(format!(
                "expected {} emission probabilities, got {}",
                n,
                emission_make.len()
            )));
        }
        check_distribution("initial", &initial)?;
        for (i, row) in transition.iter().enumerate() {
            check_distribution(&format!("transition row {}", i), row)?;
        }
        if emission_make
            .iter()
            .any(|p| !p.is_finite() || !(0.0..=1.0).contains(p))
        {
            return Err(EstimatorError::InvalidParameters(
                "emission probabilities must lie in [0, 1]".to_string(),
            ));
        }

        Ok(Self {
            initial,
            transition,
            emission_make,
            min_probability,
        })
    }

    /// Seeded starting point for EM.
    ///
    /// Start and transition distributions are uniform. Each state's emission
    /// row is two uniform draws normalized to sum to one, so the same seed
    /// always yields the same starting model.
    pub fn seeded(n_states: usize, seed: u64, min_probability: f64) -> Result<Self, EstimatorError> {
        if n_states == 0 || n_states > usize::from(u8::MAX) {
            return Err(EstimatorError::InvalidStateCount(n_states));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let uniform = 1.0 / n_states as f64;
        let emission_make = (0..n_states)
            .map(|_| {
                let miss: f64 = rng.random();
                let make: f64 = rng.random();
                let total = miss + make;
                let p = if total > 0.0 { make / total } else { 0.5 };
                clamp_probability(p, min_probability)
            })
            .collect();

        Self::new(
            vec![uniform; n_states],
            vec![vec![uniform; n_states]; n_states],
            emission_make,
            min_probability,
        )
    }

    pub fn n_states(&self) -> usize {
        self.initial.len()
    }

    pub fn min_probability(&self) -> f64 {
        self.min_probability
    }

    fn log_params(&self) -> LogParams {
        let floor = self.min_probability;
        LogParams {
            initial: self.initial.iter().map(|&p| ln_floored(p, floor)).collect(),
            transition: self
                .transition
                .iter()
                .map(|row| row.iter().map(|&p| ln_floored(p, floor)).collect())
                .collect(),
            emission: self
                .emission_make
                .iter()
                .map(|&p| log_emission_pair(p, floor))
                .collect(),
        }
    }

    /// Log-likelihood of an outcome sequence under the current parameters.
    pub fn log_likelihood(&self, outcomes: &[u8]) -> Result<f64, EstimatorError> {
        check_outcomes(outcomes)?;
        let lp = self.log_params();
        let (_, ll) = self.forward(&lp, outcomes);
        Ok(ll)
    }

    fn forward(&self, lp: &LogParams, outcomes: &[u8]) -> (Lattice, f64) {
        let n = self.n_states();
        let mut alpha = Lattice::new(outcomes.len(), n);
        let mut terms = vec![0.0; n];

        let first = usize::from(outcomes[0]);
        for (i, a) in alpha.row_mut(0).iter_mut().enumerate() {
            *a = lp.initial[i] + lp.emission[i][first];
        }

        for t in 1..outcomes.len() {
            let symbol = usize::from(outcomes[t]);
            for j in 0..n {
                for (i, term) in terms.iter_mut().enumerate() {
                    *term = alpha.values[(t - 1) * n + i] + lp.transition[i][j];
                }
                alpha.values[t * n + j] = log_sum_exp(&terms) + lp.emission[j][symbol];
            }
        }

        let ll = log_sum_exp(alpha.row(outcomes.len() - 1));
        (alpha, ll)
    }

    fn backward(&self, lp: &LogParams, outcomes: &[u8]) -> Lattice {
        let n = self.n_states();
        let len = outcomes.len();
        // Last row stays at ln 1 = 0.
        let mut beta = Lattice::new(len, n);
        let mut terms = vec![0.0; n];

        for t in (0..len - 1).rev() {
            let next = usize::from(outcomes[t + 1]);
            for i in 0..n {
                for (j, term) in terms.iter_mut().enumerate() {
                    *term = lp.transition[i][j]
                        + lp.emission[j][next]
                        + beta.values[(t + 1) * n + j];
                }
                beta.values[t * n + i] = log_sum_exp(&terms);
            }
        }
        beta
    }

    /// One M-step from forward/backward lattices.
    ///
    /// A state that received (numerically) no posterior mass keeps its
    /// previous parameters instead of collapsing to NaN.
    fn reestimate(&mut self, lp: &LogParams, outcomes: &[u8], alpha: &Lattice, beta: &Lattice, ll: f64) {
        let n = self.n_states();
        let len = outcomes.len();
        let floor = self.min_probability;

        let mut start = vec![0.0; n];
        let mut occupancy = vec![0.0; n];
        let mut departures = vec![0.0; n];
        let mut makes = vec![0.0; n];
        let mut flows = vec![vec![0.0; n]; n];

        let mut posterior = vec![0.0; n];
        for t in 0..len {
            for (i, p) in posterior.iter_mut().enumerate() {
                *p = alpha.values[t * n + i] + beta.values[t * n + i];
            }
            normalize_log(&mut posterior);
            for i in 0..n {
                let gamma = posterior[i];
                if t == 0 {
                    start[i] = gamma;
                }
                occupancy[i] += gamma;
                if t + 1 < len {
                    departures[i] += gamma;
                }
                if outcomes[t] == 1 {
                    makes[i] += gamma;
                }
            }
        }

        for t in 0..len.saturating_sub(1) {
            let next = usize::from(outcomes[t + 1]);
            for i in 0..n {
                let from = alpha.values[t * n + i];
                for j in 0..n {
                    let log_xi = from
                        + lp.transition[i][j]
                        + lp.emission[j][next]
                        + beta.values[(t + 1) * n + j]
                        - ll;
                    flows[i][j] += log_xi.exp();
                }
            }
        }

        floor_and_normalize(&mut start, floor);
        if start.iter().all(|p| p.is_finite()) {
            self.initial = start;
        }

        for i in 0..n {
            if departures[i] > floor {
                let mut row = std::mem::take(&mut flows[i]);
                if floor_and_normalize(&mut row, floor) {
                    self.transition[i] = row;
                }
            }
            if occupancy[i] > floor {
                self.emission_make[i] = clamp_probability(makes[i] / occupancy[i], floor);
            }
        }
    }

    /// Run Baum-Welch in place.
    ///
    /// Stops when the log-likelihood gain between consecutive iterations
    /// falls below `tolerance`, or after `max_iter` re-estimation steps.
    /// The parameters left in `self` are the best-scoring iterate seen.
    pub fn fit(
        &mut self,
        outcomes: &[u8],
        max_iter: usize,
        tolerance: f64,
    ) -> Result<FitReport, EstimatorError> {
        check_outcomes(outcomes)?;

        let mut best = self.clone();
        let mut best_ll = f64::NEG_INFINITY;
        let mut prev_ll = f64::NEG_INFINITY;
        let mut iterations = 0;
        let mut converged = false;

        loop {
            let lp = self.log_params();
            let (alpha, ll) = self.forward(&lp, outcomes);
            if !ll.is_finite() {
                return Err(EstimatorError::NonFiniteLikelihood {
                    iteration: iterations,
                });
            }
            if ll > best_ll {
                best_ll = ll;
                best.clone_from(self);
            }
            if prev_ll.is_finite() && ll - prev_ll < tolerance {
                converged = true;
                break;
            }
            if iterations == max_iter {
                break;
            }
            prev_ll = ll;

            let beta = self.backward(&lp, outcomes);
            self.reestimate(&lp, outcomes, &alpha, &beta, ll);
            iterations += 1;
        }

        *self = best;
        Ok(FitReport {
            iterations,
            converged,
            log_likelihood: best_ll,
        })
    }

    /// Viterbi decode: the single most probable state path.
    ///
    /// Returns the path and its joint log-probability. Ties between states
    /// resolve to the lowest index at every step.
    pub fn viterbi(&self, outcomes: &[u8]) -> Result<(Vec<u8>, f64), EstimatorError> {
        check_outcomes(outcomes)?;
        let n = self.n_states();
        let len = outcomes.len();
        let lp = self.log_params();

        let mut delta = Lattice::new(len, n);
        let mut backptr = vec![0u8; len * n];

        let first = usize::from(outcomes[0]);
        for (i, d) in delta.row_mut(0).iter_mut().enumerate() {
            *d = lp.initial[i] + lp.emission[i][first];
        }

        let mut scores = vec![f64::NEG_INFINITY; n];
        for t in 1..len {
            let symbol = usize::from(outcomes[t]);
            for j in 0..n {
                for (i, score) in scores.iter_mut().enumerate() {
                    *score = delta.values[(t - 1) * n + i] + lp.transition[i][j];
                }
                let best_i = argmax_first(&scores).unwrap_or(0);
                delta.values[t * n + j] = scores[best_i] + lp.emission[j][symbol];
                backptr[t * n + j] = best_i as u8;
            }
        }

        let last = delta.row(len - 1);
        let mut state = argmax_first(last).unwrap_or(0);
        let log_prob = last[state];

        let mut path = vec![0u8; len];
        path[len - 1] = state as u8;
        for t in (1..len).rev() {
            state = usize::from(backptr[t * n + state]);
            path[t - 1] = state as u8;
        }

        Ok((path, log_prob))
    }
}

fn check_outcomes(outcomes: &[u8]) -> Result<(), EstimatorError> {
    if outcomes.is_empty() {
        return Err(EstimatorError::EmptySequence);
    }
    if let Some((position, &value)) = outcomes.iter().enumerate().find(|&(_, &v)| v > 1) {
        return Err(EstimatorError::InvalidSymbol { position, value });
    }
    Ok(())
}

fn check_distribution(name: &str, probs: &[f64]) -> Result<(), EstimatorError> {
    if probs.iter().any(|p| !p.is_finite() || *p < 0.0) {
        return Err(EstimatorError::InvalidParameters(format!(
            "{} has negative or non-finite entries",
            name
        )));
    }
    let sum: f64 = probs.iter().sum();
    if (sum - 1.0).abs() > 1e-6 {
        return Err(EstimatorError::InvalidParameters(format!(
            "{} sums to {}, expected 1.0",
            name, sum
        )));
    }
    Ok(())
}

/// Floor every entry then renormalize. Returns false if the row had no mass.
fn floor_and_normalize(values: &mut [f64], floor: f64) -> bool {
    for v in values.iter_mut() {
        if !v.is_finite() {
            *v = 0.0;
        }
        *v = v.max(floor);
    }
    normalize(values).is_some()
}
