//! Fuzz target for process status parsing.
//!
//! Arbitrary status text must parse into a table, and every value must
//! either convert or return an error.

#![no_main]

use harvest_agent::runtime::{parse_status_table, parse_status_value};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    for (key, value) in parse_status_table(raw) {
        let _ = parse_status_value(&key, &value);
    }
});
