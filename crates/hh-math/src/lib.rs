//! Hot Hand math utilities.

pub mod math;

pub use math::bernoulli;
pub use math::stable::*;
