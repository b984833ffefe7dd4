//! The one error type every Hot Hand crate converts into.
//!
//! Each variant has a numeric code that scripts can rely on, a category,
//! a recoverability flag, and a one-line fix for whoever reads stderr.
//!
//! # On a terminal
//!
//! ```text
//! ✗ Input Validation Failed
//!   Reason: input is missing required field: SHOT_MADE
//!   Fix: Add the column to the input file. Column names are matched case-insensitively.
//! ```
//!
//! # With `--format json`
//!
//! ```json
//! {
//!   "code": 20,
//!   "category": "input",
//!   "message": "input is missing required field: SHOT_MADE",
//!   "recoverable": true,
//!   "context": { "field": "SHOT_MADE" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse grouping; each category owns a block of ten codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Engine configuration errors.
    Config,
    /// Batch-level input validation errors.
    Input,
    /// Model fitting and numerical errors.
    Inference,
    /// Derived-statistics queries against analysis output.
    Query,
    /// File I/O and serialization errors.
    Io,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Input => "input",
            Self::Inference => "inference",
            Self::Query => "query",
            Self::Io => "io",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    // 10-19
    #[error("could not load engine config: {0}")]
    Config(String),

    #[error("invalid engine config: {0}")]
    InvalidConfig(String),

    #[error("schema version mismatch: expected {expected}, got {actual}")]
    SchemaVersion { expected: String, actual: String },

    // 20-29
    #[error("input is missing required field: {field}")]
    MissingField { field: String },

    #[error("input contains no records")]
    EmptyInput,

    #[error("malformed input: {0}")]
    Input(String),

    // 30-39
    #[error("state estimation failed: {0}")]
    Inference(String),

    #[error("non-finite value during fitting: {0}")]
    NumericalInstability(String),

    // 40-49
    #[error("player not found in analysis output: {player}")]
    UnknownEntity { player: String },

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    // 60-69
    #[error("file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid CSV: {0}")]
    Csv(String),
}

impl Error {
    /// Stable numeric code. The tens digit follows [`ErrorCategory`]:
    /// 1x config, 2x input, 3x inference, 4x query, 6x files.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidConfig(_) => 11,
            Error::SchemaVersion { .. } => 12,
            Error::MissingField { .. } => 20,
            Error::EmptyInput => 21,
            Error::Input(_) => 22,
            Error::Inference(_) => 30,
            Error::NumericalInstability(_) => 31,
            Error::UnknownEntity { .. } => 40,
            Error::InvalidQuery(_) => 41,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
            Error::Csv(_) => 62,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidConfig(_) | Error::SchemaVersion { .. } => {
                ErrorCategory::Config
            }

            Error::MissingField { .. } | Error::EmptyInput | Error::Input(_) => {
                ErrorCategory::Input
            }

            Error::Inference(_) | Error::NumericalInstability(_) => ErrorCategory::Inference,

            Error::UnknownEntity { .. } | Error::InvalidQuery(_) => ErrorCategory::Query,

            Error::Io(_) | Error::Json(_) | Error::Csv(_) => ErrorCategory::Io,
        }
    }

    /// True when changing the input, config, or arguments can fix it.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) | Error::InvalidConfig(_) | Error::SchemaVersion { .. } => true,

            // Fix the input file and rerun
            Error::MissingField { .. } | Error::EmptyInput | Error::Input(_) => true,

            // Fitting is deterministic; rerunning the same input changes nothing
            Error::Inference(_) | Error::NumericalInstability(_) => false,

            Error::UnknownEntity { .. } => false,
            Error::InvalidQuery(_) => true,

            Error::Io(_) => true,
            Error::Json(_) | Error::Csv(_) => true,
        }
    }

    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) => {
                "Run 'hh-core config validate' to check the engine config, or remove it to use defaults."
            }
            Error::InvalidConfig(_) => {
                "Fix the reported field in engine.json. 'hh-core config show' prints the resolved values."
            }
            Error::SchemaVersion { .. } => {
                "Update the config file's schema_version, or regenerate it with 'hh-core config show'."
            }

            Error::MissingField { .. } => {
                "Add the column to the input file. Column names are matched case-insensitively."
            }
            Error::EmptyInput => "The input file has a header but no shot records.",
            Error::Input(_) => {
                "Check the input file format. Use '--input-format' if the extension is ambiguous."
            }

            Error::Inference(_) => {
                "Internal estimator error. Report it together with the input file and config."
            }
            Error::NumericalInstability(_) => {
                "Internal numerical issue. Report it together with the input file and config."
            }

            Error::UnknownEntity { .. } => {
                "The player is absent from the analysis output. Check spelling or the player allowlist."
            }
            Error::InvalidQuery(_) => "Check the query arguments ('--category', '--window').",

            Error::Io(_) => "Check that the file exists, permissions, and free disk space.",
            Error::Json(_) => "Invalid JSON. Check syntax with 'jq .' or regenerate the file.",
            Error::Csv(_) => "Invalid CSV. Check quoting and that every row has the header's column count.",
        }
    }

    /// Title line for terminal output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Config Not Loaded",
            Error::InvalidConfig(_) => "Invalid Engine Configuration",
            Error::SchemaVersion { .. } => "Schema Version Mismatch",

            Error::MissingField { .. } => "Input Validation Failed",
            Error::EmptyInput => "Empty Input",
            Error::Input(_) => "Malformed Input",

            Error::Inference(_) => "State Estimation Error",
            Error::NumericalInstability(_) => "Fit Diverged",

            Error::UnknownEntity { .. } => "Player Not Found",
            Error::InvalidQuery(_) => "Invalid Query",

            Error::Io(_) => "File Error",
            Error::Json(_) => "Invalid JSON",
            Error::Csv(_) => "Invalid CSV",
        }
    }
}

/// JSON shape of an error, written to stderr under `--format json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    pub code: u32,
    pub category: ErrorCategory,
    pub message: String,
    pub recoverable: bool,
    /// Variant fields worth matching on, such as the missing column.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let pairs: Vec<(&str, &String)> = match err {
            Error::MissingField { field } => vec![("field", field)],
            Error::UnknownEntity { player } => vec![("player", player)],
            Error::SchemaVersion { expected, actual } => {
                vec![("expected", expected), ("actual", actual)]
            }
            _ => Vec::new(),
        };
        let context = pairs
            .into_iter()
            .map(|(key, value)| (key.to_string(), serde_json::Value::from(value.as_str())))
            .collect();

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            context,
        }
    }
}

impl StructuredError {
    /// Single-line JSON. Falls back to a bare code object if encoding fails.
    pub fn to_json(&self) -> String {
        match serde_json::to_string(self) {
            Ok(json) => json,
            Err(_) => serde_json::json!({ "code": self.code }).to_string(),
        }
    }
}

/// Three-line stderr rendering: headline, reason, fix.
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    const RED: &str = "\x1b[31m";
    const CYAN: &str = "\x1b[36m";
    const RESET: &str = "\x1b[0m";

    let paint = |code: &'static str, text: &str| {
        if use_color {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    };

    [
        format!("{} {}", paint(RED, "✗"), err.headline()),
        format!("  Reason: {err}"),
        format!("  {} {}", paint(CYAN, "Fix:"), err.remediation()),
    ]
    .join("\n")
}
