//! Fuzz target for agent configuration files.

#![no_main]

use harvest_agent::AgentConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(raw) = std::str::from_utf8(data) {
        if let Ok(config) = AgentConfig::from_toml_str(raw) {
            let _ = config.warnings();
            let _ = config.effective_config();
        }
    }
});
