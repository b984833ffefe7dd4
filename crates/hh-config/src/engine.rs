//! Engine configuration types.
//!
//! Every field carries a default, so a partial engine.json is valid and an
//! empty object `{}` is equivalent to the built-in defaults.

use serde::{Deserialize, Serialize};

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub schema_version: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub estimator: EstimatorConfig,
    pub preparation: PreparationConfig,
    pub labeling: LabelingConfig,
    pub trajectory: TrajectoryConfig,
    pub runtime: RuntimeConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            description: None,
            estimator: EstimatorConfig::default(),
            preparation: PreparationConfig::default(),
            labeling: LabelingConfig::default(),
            trajectory: TrajectoryConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load engine config from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, crate::validate::ValidationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::validate::ValidationError::IoError(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_str(&content)
    }

    /// Parse engine config from a JSON string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(json: &str) -> Result<Self, crate::validate::ValidationError> {
        serde_json::from_str(json).map_err(|e| {
            crate::validate::ValidationError::ParseError(format!("Invalid JSON: {}", e))
        })
    }
}

/// Hidden-state estimator parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Number of latent states.
    pub n_states: usize,
    /// Baum-Welch iteration cap.
    pub max_iter: usize,
    /// Stop once the log-likelihood gain falls below this value.
    pub tolerance: f64,
    /// Seed for parameter initialization, shared by every entity.
    pub seed: u64,
    /// Floor applied to every probability to avoid log(0).
    pub min_probability: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            n_states: 3,
            max_iter: 200,
            tolerance: 1e-2,
            seed: 42,
            min_probability: 1e-10,
        }
    }
}

/// Sequence preparation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreparationConfig {
    /// Entities with fewer attempts are not fitted.
    pub min_sequence_len: usize,
    /// Optional player allowlist; None keeps everyone.
    pub players: Option<Vec<String>>,
}

impl Default for PreparationConfig {
    fn default() -> Self {
        Self {
            min_sequence_len: 100,
            players: None,
        }
    }
}

/// Which states count as the "hot zone".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelingPolicyKind {
    /// The single state with the highest empirical make rate.
    #[default]
    ArgmaxMean,
    /// The `top_k` states with the highest empirical make rates.
    TopK,
}

impl std::fmt::Display for LabelingPolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LabelingPolicyKind::ArgmaxMean => write!(f, "argmax_mean"),
            LabelingPolicyKind::TopK => write!(f, "top_k"),
        }
    }
}

/// Hot-zone labeling parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelingConfig {
    pub policy: LabelingPolicyKind,
    /// Only used by `top_k`.
    pub top_k: usize,
}

impl Default for LabelingConfig {
    fn default() -> Self {
        Self {
            policy: LabelingPolicyKind::ArgmaxMean,
            top_k: 1,
        }
    }
}

/// Rolling-form trajectory parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectoryConfig {
    /// Trailing window for the current-form mean.
    pub rolling_window: usize,
    /// Keep every `stride`-th point when sampling the trajectory.
    pub stride: usize,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            rolling_window: 100,
            stride: 20,
        }
    }
}

/// Execution parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum concurrent fitting tasks; 0 means available parallelism.
    pub workers: usize,
}

impl RuntimeConfig {
    /// Resolve `workers` into a concrete, non-zero task count.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.estimator.n_states, 3);
        assert_eq!(config.estimator.max_iter, 200);
        assert_eq!(config.estimator.seed, 42);
        assert_eq!(config.preparation.min_sequence_len, 100);
        assert_eq!(config.trajectory.rolling_window, 100);
        assert_eq!(config.trajectory.stride, 20);
        assert_eq!(config.labeling.policy, LabelingPolicyKind::ArgmaxMean);
    }

    #[test]
    fn empty_object_is_default() {
        let config = EngineConfig::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config =
            EngineConfig::from_str(r#"{"estimator": {"n_states": 4}, "runtime": {"workers": 2}}"#)
                .unwrap();
        assert_eq!(config.estimator.n_states, 4);
        assert_eq!(config.estimator.max_iter, 200);
        assert_eq!(config.runtime.workers, 2);
        assert_eq!(config.preparation.min_sequence_len, 100);
    }

    #[test]
    fn labeling_policy_snake_case() {
        let config = EngineConfig::from_str(r#"{"labeling": {"policy": "top_k", "top_k": 2}}"#)
            .unwrap();
        assert_eq!(config.labeling.policy, LabelingPolicyKind::TopK);
        assert_eq!(config.labeling.top_k, 2);
        assert_eq!(LabelingPolicyKind::TopK.to_string(), "top_k");
    }

    #[test]
    fn invalid_json_is_parse_error() {
        let err = EngineConfig::from_str("{not json").unwrap_err();
        assert!(matches!(err, crate::ValidationError::ParseError(_)));
    }

    #[test]
    fn effective_workers_never_zero() {
        assert!(RuntimeConfig { workers: 0 }.effective_workers() >= 1);
        assert_eq!(RuntimeConfig { workers: 3 }.effective_workers(), 3);
    }
}
