//! Hot Hand common types, IDs, and errors.
//!
//! This crate provides foundational types shared across the hh-* crates:
//! - Player and game identity types
//! - The unified error type with stable codes
//! - Output format specifications

pub mod error;
pub mod id;
pub mod output;

pub use error::{format_error_human, Error, ErrorCategory, Result, StructuredError};
pub use id::{GameId, PlayerId};
pub use output::OutputFormat;

/// Schema version stamped on run summaries and exported reports.
pub const SCHEMA_VERSION: &str = "1.0.0";
