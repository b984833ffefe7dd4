//! Stages and stable event names for structured logging.

use serde::{Deserialize, Serialize};

/// Processing stages in an analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Reading and validating shot records.
    Ingest,
    /// Grouping and ordering per-player sequences.
    Prepare,
    /// Per-player model fitting and decoding.
    Fit,
    /// Hot-zone labeling and merge.
    Label,
    /// Writing augmented rows.
    Export,
    /// Derived statistics over an exported file.
    Report,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Ingest => "ingest",
            Stage::Prepare => "prepare",
            Stage::Fit => "fit",
            Stage::Label => "label",
            Stage::Export => "export",
            Stage::Report => "report",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Run lifecycle
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";

    // Config
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";

    // Ingest
    pub const INGEST_STARTED: &str = "ingest.started";
    pub const INGEST_FINISHED: &str = "ingest.finished";

    // Prepare
    pub const PREPARE_FINISHED: &str = "prepare.finished";
    pub const PREPARE_ENTITY_SKIPPED: &str = "prepare.entity_skipped";

    // Fit
    pub const FIT_STARTED: &str = "fit.started";
    pub const FIT_ENTITY_DONE: &str = "fit.entity_done";
    pub const FIT_FINISHED: &str = "fit.finished";

    // Label
    pub const LABEL_FINISHED: &str = "label.finished";

    // Export / report
    pub const EXPORT_WRITTEN: &str = "export.written";
    pub const REPORT_CACHE_HIT: &str = "report.cache_hit";
    pub const REPORT_CACHE_MISS: &str = "report.cache_miss";

    pub const INTERNAL_ERROR: &str = "internal_error";
}

/// Correlation context carried through a run.
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Unique ID for this invocation.
    pub run_id: String,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display_matches_serde() {
        for stage in [
            Stage::Init,
            Stage::Ingest,
            Stage::Prepare,
            Stage::Fit,
            Stage::Label,
            Stage::Export,
            Stage::Report,
        ] {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage));
        }
    }

    #[test]
    fn test_event_names() {
        assert_eq!(event_names::RUN_STARTED, "run.started");
        assert_eq!(event_names::FIT_ENTITY_DONE, "fit.entity_done");
        assert_eq!(event_names::INGEST_FINISHED, "ingest.finished");
    }

    #[test]
    fn test_log_context() {
        let ctx = LogContext::new("run-abc");
        assert_eq!(ctx.run_id, "run-abc");
    }
}
