//! Latent state inference: the binary HMM, the per-entity estimator, and
//! hot-zone labeling policies.

pub mod estimator;
pub mod hmm;
pub mod labeling;

pub use estimator::{EntityFit, EstimatorSettings, FittedStateModel, StateEstimator};
pub use hmm::{BinaryHmm, EstimatorError, FitReport};
pub use labeling::{
    policy_from_config, state_stats, ArgmaxMean, HotZoneLabel, HotZonePolicy, StateStats,
    TopKMean,
};
