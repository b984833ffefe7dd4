//! Hot-zone labeling: ranking decoded states by empirical make rate.
//!
//! Ranking uses what actually happened on the shots assigned to each state,
//! not the fitted emission parameters. A state no shot was decoded into has
//! no rate and can never be hot.

use hh_config::{LabelingConfig, LabelingPolicyKind};
use hh_math::argmax_first;
use hh_math::bernoulli::BernoulliCounts;
use serde::{Deserialize, Serialize};

/// Empirical outcome counts for one decoded state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateStats {
    pub state: u8,
    pub shots: u64,
    pub makes: u64,
    /// Mean outcome over assigned shots; None when no shot was assigned.
    pub make_rate: Option<f64>,
}

/// Tally assigned shots per state.
///
/// `states` and `outcomes` must be the same length (the decoded path and the
/// sequence it was decoded from).
pub fn state_stats(states: &[u8], outcomes: &[u8], n_states: usize) -> Vec<StateStats> {
    (0..n_states)
        .map(|state| {
            let state = state as u8;
            let c = BernoulliCounts::from_outcomes(
                states
                    .iter()
                    .zip(outcomes)
                    .filter(|&(&s, _)| s == state)
                    .map(|(_, o)| o),
            );
            StateStats {
                state,
                shots: c.trials,
                makes: c.successes,
                make_rate: c.rate(),
            }
        })
        .collect()
}

/// Chooses which decoded states count as the hot zone.
pub trait HotZonePolicy: Send + Sync {
    /// Stable policy name for summaries and logs.
    fn name(&self) -> &'static str;

    /// Hot states in rank order (best first). Empty when no state has shots.
    fn hot_states(&self, stats: &[StateStats]) -> Vec<u8>;
}

/// States with at least one shot, best make rate first, lowest index on ties.
fn ranked(stats: &[StateStats]) -> Vec<(u8, f64)> {
    let mut rated: Vec<(u8, f64)> = stats
        .iter()
        .filter_map(|s| s.make_rate.map(|r| (s.state, r)))
        .collect();
    rated.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    rated
}

/// The single state with the strictly highest make rate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArgmaxMean;

impl HotZonePolicy for ArgmaxMean {
    fn name(&self) -> &'static str {
        "argmax_mean"
    }

    fn hot_states(&self, stats: &[StateStats]) -> Vec<u8> {
        // Unvisited states become NaN, which never wins.
        let rates: Vec<f64> = stats
            .iter()
            .map(|s| s.make_rate.unwrap_or(f64::NAN))
            .collect();
        argmax_first(&rates)
            .map(|i| vec![stats[i].state])
            .unwrap_or_default()
    }
}

/// The `k` states with the highest make rates.
#[derive(Debug, Clone, Copy)]
pub struct TopKMean {
    k: usize,
}

impl TopKMean {
    pub fn new(k: usize) -> Self {
        Self { k: k.max(1) }
    }
}

impl HotZonePolicy for TopKMean {
    fn name(&self) -> &'static str {
        "top_k"
    }

    fn hot_states(&self, stats: &[StateStats]) -> Vec<u8> {
        ranked(stats)
            .into_iter()
            .take(self.k)
            .map(|(s, _)| s)
            .collect()
    }
}

/// Build the configured policy.
pub fn policy_from_config(config: &LabelingConfig) -> Box<dyn HotZonePolicy> {
    match config.policy {
        LabelingPolicyKind::ArgmaxMean => Box::new(ArgmaxMean),
        LabelingPolicyKind::TopK => Box::new(TopKMean::new(config.top_k)),
    }
}

/// Per-entity hot-zone designation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotZoneLabel {
    pub policy: String,
    pub hot_states: Vec<u8>,
}

impl HotZoneLabel {
    pub fn assign(policy: &dyn HotZonePolicy, stats: &[StateStats]) -> Self {
        Self {
            policy: policy.name().to_string(),
            hot_states: policy.hot_states(stats),
        }
    }

    /// Primary hot state (the best-ranked one).
    pub fn primary(&self) -> Option<u8> {
        self.hot_states.first().copied()
    }

    pub fn is_hot(&self, state: u8) -> bool {
        self.hot_states.contains(&state)
    }

    /// One flag per decoded shot.
    pub fn flags(&self, states: &[u8]) -> Vec<bool> {
        states.iter().map(|&s| self.is_hot(s)).collect()
    }
}
