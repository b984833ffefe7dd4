//! Output format specifications.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Supported output formats for run summaries and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Structured JSON (default for machine consumption)
    #[default]
    Json,

    /// Human-readable Markdown
    Md,

    /// One-line summary per player
    Summary,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Md => write!(f, "md"),
            OutputFormat::Summary => write!(f, "summary"),
        }
    }
}
