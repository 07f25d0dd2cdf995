//! Fuzz target for ACTMC model loading.
//!
//! Arbitrary input must either load into a validated model or return an
//! error; a loaded model must survive a JSON round-trip.

#![no_main]

use gsmp_core::model::Actmc;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(model) = Actmc::from_json(text) {
        if let Ok(json) = model.to_json() {
            assert!(Actmc::from_json(&json).is_ok());
        }
    }
});
