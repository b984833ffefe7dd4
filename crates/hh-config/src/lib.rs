//! Hot Hand engine configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for engine.json
//! - Config resolution (CLI → env → XDG → system → defaults)
//! - Semantic validation
//! - Config snapshots for run summaries

pub mod engine;
pub mod resolve;
pub mod snapshot;
pub mod validate;

pub use engine::{
    EngineConfig, EstimatorConfig, LabelingConfig, LabelingPolicyKind, PreparationConfig,
    RuntimeConfig, TrajectoryConfig,
};
pub use resolve::{resolve_config, ConfigPaths, ConfigSource};
pub use snapshot::ConfigSnapshot;
pub use validate::{validate_config, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

/// A validated configuration together with where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: EngineConfig,
    pub snapshot: ConfigSnapshot,
}

/// Resolve, load, and validate the engine configuration.
///
/// `cli_path` takes precedence over every other source. With no file found
/// anywhere, the built-in defaults are used.
pub fn load_config(cli_path: Option<&std::path::Path>) -> ValidationResult<LoadedConfig> {
    let paths = resolve_config(cli_path);

    if let Some(path) = cli_path {
        if paths.source != ConfigSource::CliArgument {
            return Err(ValidationError::IoError(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
    }

    match &paths.engine {
        Some(path) => {
            let content = std::fs::read_to_string(path).map_err(|e| {
                ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
            })?;
            let config = EngineConfig::from_str(&content)?;
            validate_config(&config)?;
            let snapshot = ConfigSnapshot::new(&config, &paths, Some(&content));
            Ok(LoadedConfig { config, snapshot })
        }
        None => {
            let config = EngineConfig::default();
            Ok(LoadedConfig {
                snapshot: ConfigSnapshot::new(&config, &paths, None),
                config,
            })
        }
    }
}
