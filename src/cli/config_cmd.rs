// Copyright 2026 Harvest Agent Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config CLI subcommands: show, defaults, validate.
//!
//! These commands only read configuration; no agent is started.

use crate::config::{
    AgentConfig, EffectiveConfig, ENV_COLLECT_GC, ENV_COLLECT_HTTP, ENV_COLLECT_HTTP_STATUSES,
    ENV_COLLECT_MEMORY, ENV_GC_POLL_INTERVAL, ENV_GUID, ENV_LICENSE, ENV_MEMORY_POLL_INTERVAL,
    ENV_NAME, ENV_REPORT_INTERVAL, ENV_VERBOSE,
};

/// Print effective config to stdout, as `KEY=value` lines or JSON.
pub fn run_show(config: &AgentConfig, json: bool) -> i32 {
    let effective = config.effective_config();
    if json {
        match serde_json::to_string_pretty(&effective) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Failed to serialize configuration: {}", e);
                return 1;
            }
        }
    } else {
        for line in config_lines(&effective) {
            println!("{}", line);
        }
    }
    0
}

/// Print default config values (no env overrides) to stdout.
pub fn run_defaults() {
    for line in config_lines(&AgentConfig::default().effective_config()) {
        println!("{}", line);
    }
}

/// Validate configuration for obvious misconfigurations.
///
/// Returns 0 if valid, 1 if any warnings are found.
pub fn run_validate(config: &AgentConfig) -> i32 {
    let warnings = config.warnings();
    if warnings.is_empty() {
        println!("Configuration is valid.");
        return 0;
    }
    for warning in &warnings {
        eprintln!("WARNING: {}", warning);
    }
    1
}

fn config_lines(cfg: &EffectiveConfig) -> Vec<String> {
    let license = cfg
        .license_fingerprint
        .as_deref()
        .map(|fp| format!("<sha256:{}>", fp))
        .unwrap_or_default();
    vec![
        format!("{}={}", ENV_LICENSE, license),
        format!("{}={}", ENV_NAME, cfg.name),
        format!("{}={}", ENV_GUID, cfg.guid),
        format!("{}={}", ENV_REPORT_INTERVAL, cfg.report_interval_secs),
        format!("{}={}", ENV_GC_POLL_INTERVAL, cfg.gc_poll_interval_secs),
        format!("{}={}", ENV_MEMORY_POLL_INTERVAL, cfg.memory_poll_interval_secs),
        format!("{}={}", ENV_COLLECT_GC, cfg.collect_gc),
        format!("{}={}", ENV_COLLECT_MEMORY, cfg.collect_memory),
        format!("{}={}", ENV_COLLECT_HTTP, cfg.collect_http),
        format!("{}={}", ENV_COLLECT_HTTP_STATUSES, cfg.collect_http_statuses),
        format!("{}={}", ENV_VERBOSE, cfg.verbose),
    ]
}
