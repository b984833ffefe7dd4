//! Hot Hand Core Library
//!
//! Latent-state segmentation of per-player shot sequences:
//! - Shot log ingest (CSV, JSON Lines) with row accounting
//! - Chronological sequence preparation per player
//! - Binary-emission HMM fitting (Baum-Welch) and Viterbi decoding
//! - Hot-zone labeling by empirical state make rate
//! - Parallel batch pipeline producing augmented shot rows
//! - Derived efficiency statistics and career trajectories
//!
//! The binary entry point is in `main.rs`.

pub mod cache;
pub mod exit_codes;
pub mod export;
pub mod inference;
pub mod ingest;
pub mod logging;
pub mod pipeline;
pub mod prepare;
pub mod stats;
pub mod summary;

pub use cache::{CacheKey, CacheStats, DatasetCache};
pub use pipeline::{AnalysisOutput, AugmentedShot, EntityReport, EntityStatus, Pipeline};
pub use prepare::{EntitySequence, ShotCategory, ShotEvent};
