//! Per-entity latent state estimation: seed, fit, decode, label.
//!
//! A `StateEstimator` is immutable and shared across fitting threads. Every
//! call starts from the same seeded parameters, so results depend only on
//! the outcome sequence and the configuration.

use hh_config::EstimatorConfig;
use serde::{Deserialize, Serialize};

use super::hmm::{BinaryHmm, EstimatorError, FitReport};
use super::labeling::{state_stats, HotZoneLabel, HotZonePolicy, StateStats};

/// Estimator settings, validated at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct EstimatorSettings {
    pub n_states: usize,
    pub max_iter: usize,
    pub tolerance: f64,
    pub seed: u64,
    pub min_probability: f64,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self::from(&EstimatorConfig::default())
    }
}

impl From<&EstimatorConfig> for EstimatorSettings {
    fn from(config: &EstimatorConfig) -> Self {
        Self {
            n_states: config.n_states,
            max_iter: config.max_iter,
            tolerance: config.tolerance,
            seed: config.seed,
            min_probability: config.min_probability,
        }
    }
}

/// Fitted parameters plus how fitting ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedStateModel {
    pub initial: Vec<f64>,
    pub transition: Vec<Vec<f64>>,
    pub emission_make: Vec<f64>,
    pub log_likelihood: f64,
    pub iterations: usize,
    pub converged: bool,
}

impl FittedStateModel {
    fn new(model: BinaryHmm, report: FitReport) -> Self {
        Self {
            initial: model.initial,
            transition: model.transition,
            emission_make: model.emission_make,
            log_likelihood: report.log_likelihood,
            iterations: report.iterations,
            converged: report.converged,
        }
    }

    pub fn n_states(&self) -> usize {
        self.initial.len()
    }
}

/// Everything the estimator produces for one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityFit {
    pub model: FittedStateModel,
    /// Decoded state per shot, in sequence order.
    pub states: Vec<u8>,
    /// Joint log-probability of the decoded path.
    pub path_log_prob: f64,
    pub state_stats: Vec<StateStats>,
    pub label: HotZoneLabel,
}

impl EntityFit {
    /// Hot-zone flag per shot.
    pub fn hot_flags(&self) -> Vec<bool> {
        self.label.flags(&self.states)
    }
}

/// Seeded Baum-Welch estimator with Viterbi decoding.
#[derive(Debug, Clone)]
pub struct StateEstimator {
    settings: EstimatorSettings,
}

impl StateEstimator {
    pub fn new(settings: EstimatorSettings) -> Result<Self, EstimatorError> {
        // Build the seed model once so bad settings fail here, not per entity.
        BinaryHmm::seeded(settings.n_states, settings.seed, settings.min_probability)?;
        if settings.tolerance.is_nan() {
            return Err(EstimatorError::InvalidParameters(format!(
                "tolerance {} is not a number",
                settings.tolerance
            )));
        }
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &EstimatorSettings {
        &self.settings
    }

    /// Fit a model to one outcome sequence.
    pub fn fit(&self, outcomes: &[u8]) -> Result<(BinaryHmm, FitReport), EstimatorError> {
        let mut model = BinaryHmm::seeded(
            self.settings.n_states,
            self.settings.seed,
            self.settings.min_probability,
        )?;
        let report = model.fit(outcomes, self.settings.max_iter, self.settings.tolerance)?;
        Ok((model, report))
    }

    /// Fit, decode, and label one outcome sequence.
    pub fn analyze(
        &self,
        outcomes: &[u8],
        policy: &dyn HotZonePolicy,
    ) -> Result<EntityFit, EstimatorError> {
        let (model, report) = self.fit(outcomes)?;
        let (states, path_log_prob) = model.viterbi(outcomes)?;
        let stats = state_stats(&states, outcomes, model.n_states());
        let label = HotZoneLabel::assign(policy, &stats);

        Ok(EntityFit {
            model: FittedStateModel::new(model, report),
            states,
            path_log_prob,
            state_stats: stats,
            label,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::labeling::ArgmaxMean;

    fn streaky(len: usize) -> Vec<u8> {
        // Alternating hot and cold stretches of 25 shots.
        (0..len)
            .map(|i| {
                let hot = (i / 25) % 2 == 0;
                let r = (i * 7 + 3) % 10;
                u8::from(if hot { r < 8 } else { r < 2 })
            })
            .collect()
    }

    #[test]
    fn test_estimator_rejects_bad_settings() {
        let settings = EstimatorSettings {
            n_states: 0,
            ..EstimatorSettings::default()
        };
        assert!(StateEstimator::new(settings).is_err());

        let settings = EstimatorSettings {
            min_probability: 0.0,
            ..EstimatorSettings::default()
        };
        assert!(StateEstimator::new(settings).is_err());
    }

    #[test]
    fn test_deterministic_outputs() {
        let outcomes = streaky(200);
        let estimator = StateEstimator::new(EstimatorSettings::default()).unwrap();
        let a = estimator.analyze(&outcomes, &ArgmaxMean).unwrap();
        let b = estimator.analyze(&outcomes, &ArgmaxMean).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_analyze_shapes() {
        let outcomes = streaky(150);
        let estimator = StateEstimator::new(EstimatorSettings::default()).unwrap();
        let fit = estimator.analyze(&outcomes, &ArgmaxMean).unwrap();

        assert_eq!(fit.states.len(), outcomes.len());
        assert!(fit.states.iter().all(|&s| s < 3));
        assert_eq!(fit.model.n_states(), 3);
        assert_eq!(fit.state_stats.len(), 3);
        assert_eq!(
            fit.state_stats.iter().map(|s| s.shots).sum::<u64>(),
            outcomes.len() as u64
        );
        assert_eq!(fit.label.hot_states.len(), 1);
        assert!(fit.model.iterations <= 200);
    }

    #[test]
    fn test_hot_state_has_best_empirical_rate() {
        let outcomes = streaky(200);
        let estimator = StateEstimator::new(EstimatorSettings::default()).unwrap();
        let fit = estimator.analyze(&outcomes, &ArgmaxMean).unwrap();
        let hot = fit.label.primary().unwrap();
        let hot_rate = fit.state_stats[usize::from(hot)].make_rate.unwrap();
        for s in &fit.state_stats {
            if let Some(rate) = s.make_rate {
                assert!(hot_rate >= rate);
            }
        }
    }

    #[test]
    fn test_state_count_is_configurable() {
        let settings = EstimatorSettings {
            n_states: 2,
            ..EstimatorSettings::default()
        };
        let estimator = StateEstimator::new(settings).unwrap();
        let fit = estimator.analyze(&streaky(120), &ArgmaxMean).unwrap();
        assert_eq!(fit.model.n_states(), 2);
        assert!(fit.states.iter().all(|&s| s < 2));
    }

    #[test]
    fn test_empty_sequence_is_error() {
        let estimator = StateEstimator::new(EstimatorSettings::default()).unwrap();
        assert_eq!(
            estimator.analyze(&[], &ArgmaxMean).unwrap_err(),
            EstimatorError::EmptySequence
        );
    }
}
