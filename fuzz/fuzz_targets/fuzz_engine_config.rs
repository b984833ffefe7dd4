//! Fuzz target for engine config parsing and validation.
//!
//! Tests that parsing and semantic validation never panic on arbitrary
//! JSON, and that a config which validates can build an estimator.

#![no_main]

use hh_config::{validate_config, EngineConfig};
use hh_core::inference::{EstimatorSettings, StateEstimator};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let Ok(config) = EngineConfig::from_str(data) else {
        return;
    };
    if validate_config(&config).is_ok() {
        let settings = EstimatorSettings::from(&config.estimator);
        assert!(StateEstimator::new(settings).is_ok());
    }
});
