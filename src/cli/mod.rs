// Copyright 2026 Harvest Agent Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI module for the harvest agent binary.
//!
//! ## Usage
//!
//! ```bash
//! harvest-agent-cli run --output metrics.jsonl   # report until Ctrl-C
//! harvest-agent-cli config show --json           # effective configuration
//! harvest-agent-cli config validate              # exit 1 on warnings
//! ```

pub mod config_cmd;
pub mod run_cmd;

use std::path::PathBuf;

use crate::config::{self, AgentConfig, ConfigError};

pub use run_cmd::{parse_run_args, run_agent, RunOptions, SinkChoice};

/// Value of `--config FILE`, if present.
pub fn config_path_from_args(args: &[String]) -> Option<PathBuf> {
    args.iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from)
}

/// Load the TOML file named by `--config` (if any), then env overrides.
pub fn load_cli_config(args: &[String]) -> Result<AgentConfig, ConfigError> {
    match config_path_from_args(args) {
        Some(path) => config::load_from_path(&path),
        None => Ok(config::load()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_from_args() {
        let args: Vec<String> = ["config", "show", "--config", "agent.toml"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(config_path_from_args(&args), Some(PathBuf::from("agent.toml")));
        assert_eq!(config_path_from_args(&args[..2]), None);
    }

    #[test]
    fn test_missing_config_file_is_io_error() {
        let args = vec!["--config".to_string(), "/nonexistent/agent.toml".to_string()];
        assert!(matches!(load_cli_config(&args), Err(ConfigError::Io(_))));
    }
}
