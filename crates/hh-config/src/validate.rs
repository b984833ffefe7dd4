//! Configuration validation errors and semantic validation.

use thiserror::Error;

use crate::engine::{EngineConfig, LabelingPolicyKind};

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::VersionMismatch { .. } => 66,
        }
    }

    fn invalid(field: &str, message: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Validate an engine configuration semantically.
pub fn validate_config(config: &EngineConfig) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    let est = &config.estimator;
    if est.n_states < 2 {
        return Err(ValidationError::invalid(
            "estimator.n_states",
            format!("Must be at least 2, got {}", est.n_states),
        ));
    }
    if est.n_states > u8::MAX as usize {
        return Err(ValidationError::invalid(
            "estimator.n_states",
            format!("Must be at most {}, got {}", u8::MAX, est.n_states),
        ));
    }
    if est.max_iter == 0 {
        return Err(ValidationError::invalid(
            "estimator.max_iter",
            "Must be at least 1",
        ));
    }
    if !est.tolerance.is_finite() || est.tolerance < 0.0 {
        return Err(ValidationError::invalid(
            "estimator.tolerance",
            format!("Must be finite and >= 0, got {}", est.tolerance),
        ));
    }
    if !(est.min_probability > 0.0 && est.min_probability < 0.5) {
        return Err(ValidationError::invalid(
            "estimator.min_probability",
            format!("Must be in (0, 0.5), got {}", est.min_probability),
        ));
    }

    if config.preparation.min_sequence_len == 0 {
        return Err(ValidationError::invalid(
            "preparation.min_sequence_len",
            "Must be at least 1",
        ));
    }
    if let Some(players) = &config.preparation.players {
        if players.iter().any(|p| p.trim().is_empty()) {
            return Err(ValidationError::invalid(
                "preparation.players",
                "Player names must not be blank",
            ));
        }
    }

    if config.labeling.policy == LabelingPolicyKind::TopK
        && (config.labeling.top_k == 0 || config.labeling.top_k >= est.n_states)
    {
        return Err(ValidationError::invalid(
            "labeling.top_k",
            format!(
                "Must be in [1, {}) for {} states, got {}",
                est.n_states, est.n_states, config.labeling.top_k
            ),
        ));
    }

    if config.trajectory.rolling_window == 0 {
        return Err(ValidationError::invalid(
            "trajectory.rolling_window",
            "Must be at least 1",
        ));
    }
    if config.trajectory.stride == 0 {
        return Err(ValidationError::invalid(
            "trajectory.stride",
            "Must be at least 1",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        validate_config(&EngineConfig::default()).unwrap();
    }

    #[test]
    fn rejects_single_state() {
        let mut config = EngineConfig::default();
        config.estimator.n_states = 1;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { ref field, .. } if field == "estimator.n_states"));
        assert_eq!(err.code(), 65);
    }

    #[test]
    fn rejects_bad_min_probability() {
        let mut config = EngineConfig::default();
        config.estimator.min_probability = 0.0;
        assert!(validate_config(&config).is_err());
        config.estimator.min_probability = 0.5;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_nan_tolerance() {
        let mut config = EngineConfig::default();
        config.estimator.tolerance = f64::NAN;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_top_k_covering_all_states() {
        let mut config = EngineConfig::default();
        config.labeling.policy = LabelingPolicyKind::TopK;
        config.labeling.top_k = 3;
        assert!(validate_config(&config).is_err());
        config.labeling.top_k = 2;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn top_k_ignored_for_argmax_policy() {
        let mut config = EngineConfig::default();
        config.labeling.top_k = 99;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_version_mismatch() {
        let config = EngineConfig {
            schema_version: "0.9.0".to_string(),
            ..Default::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ValidationError::VersionMismatch { .. }));
    }

    #[test]
    fn rejects_blank_player_in_allowlist() {
        let mut config = EngineConfig::default();
        config.preparation.players = Some(vec!["LeBron James".into(), "  ".into()]);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_zero_window_and_stride() {
        let mut config = EngineConfig::default();
        config.trajectory.rolling_window = 0;
        assert!(validate_config(&config).is_err());

        let mut config = EngineConfig::default();
        config.trajectory.stride = 0;
        assert!(validate_config(&config).is_err());
    }
}
