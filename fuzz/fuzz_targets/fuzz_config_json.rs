//! Fuzz target for analysis configuration parsing.

#![no_main]

use gsmp_common::AnalysisConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(config) = serde_json::from_slice::<AnalysisConfig>(data) {
        let _ = config.validate();
    }
});
