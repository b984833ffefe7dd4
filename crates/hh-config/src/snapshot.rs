//! Configuration snapshots for run summaries and reproducibility.
//!
//! A snapshot captures the exact configuration used for a run, so an
//! exported analysis can be traced back to the parameters that produced it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::engine::EngineConfig;
use crate::resolve::ConfigPaths;

/// A frozen snapshot of configuration state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,

    /// Schema version of the configuration.
    pub schema_version: String,

    /// Path where the config was loaded from.
    #[serde(default)]
    pub path: Option<String>,

    /// Source of the configuration.
    pub source: String,

    /// SHA-256 hash of the engine.json content (None for defaults).
    #[serde(default)]
    pub content_hash: Option<String>,

    /// Key configuration values for quick reference.
    pub summary: ConfigSummary,
}

/// Summary of key configuration values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub n_states: usize,
    pub max_iter: usize,
    pub tolerance: f64,
    pub seed: u64,
    pub min_sequence_len: usize,
    pub labeling_policy: String,
}

impl From<&EngineConfig> for ConfigSummary {
    fn from(config: &EngineConfig) -> Self {
        ConfigSummary {
            n_states: config.estimator.n_states,
            max_iter: config.estimator.max_iter,
            tolerance: config.estimator.tolerance,
            seed: config.estimator.seed,
            min_sequence_len: config.preparation.min_sequence_len,
            labeling_policy: config.labeling.policy.to_string(),
        }
    }
}

impl ConfigSnapshot {
    /// Create a new snapshot from a loaded configuration.
    pub fn new(config: &EngineConfig, paths: &ConfigPaths, content: Option<&str>) -> Self {
        ConfigSnapshot {
            timestamp: Utc::now(),
            schema_version: config.schema_version.clone(),
            path: paths.engine.as_ref().map(|p| p.display().to_string()),
            source: paths.source.to_string(),
            content_hash: content.map(hash_content),
            summary: ConfigSummary::from(config),
        }
    }

    /// Snapshot of the built-in defaults.
    pub fn defaults_only() -> Self {
        Self::new(&EngineConfig::default(), &ConfigPaths::default(), None)
    }

    /// Short identifier for this snapshot (first 12 chars of hash, or "defaults").
    pub fn short_id(&self) -> &str {
        match &self.content_hash {
            Some(hash) => &hash[..12.min(hash.len())],
            None => "defaults",
        }
    }
}

/// Hash content with SHA-256 and return hex string.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::ConfigSource;

    #[test]
    fn test_defaults_snapshot() {
        let snapshot = ConfigSnapshot::defaults_only();
        assert_eq!(snapshot.schema_version, crate::CONFIG_SCHEMA_VERSION);
        assert!(snapshot.content_hash.is_none());
        assert_eq!(snapshot.source, ConfigSource::BuiltinDefault.to_string());
        assert_eq!(snapshot.short_id(), "defaults");
        assert_eq!(snapshot.summary.n_states, 3);
    }

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(hash_content("{}"), hash_content("{}"));
        assert_ne!(hash_content("{}"), hash_content("{ }"));
        assert_eq!(hash_content("").len(), 64);
    }

    #[test]
    fn test_short_id_uses_hash_prefix() {
        let config = EngineConfig::default();
        let snapshot = ConfigSnapshot::new(&config, &ConfigPaths::default(), Some("{}"));
        assert_eq!(snapshot.short_id().len(), 12);
        assert!(snapshot
            .content_hash
            .as_deref()
            .unwrap()
            .starts_with(snapshot.short_id()));
    }

    #[test]
    fn test_snapshot_serde_roundtrip() {
        let snapshot = ConfigSnapshot::defaults_only();
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: ConfigSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.summary, snapshot.summary);
    }
}
