// Copyright 2026 Harvest Agent Contributors
// SPDX-License-Identifier: Apache-2.0

//! `run` subcommand: start the agent and report until Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;

use crate::agent::Agent;
use crate::config::AgentConfig;
use crate::sink::{JsonLinesSink, ReportSink, TracingSink};
use crate::telemetry::{self, LogConfig, LogFormat};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkChoice {
    Tracing,
    JsonLines(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub sink: SinkChoice,
    pub log_format: LogFormat,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            sink: SinkChoice::Tracing,
            log_format: LogFormat::Json,
        }
    }
}

/// Parse `run` flags: `--output FILE`, `--log-format json|pretty`.
/// `--config FILE` is consumed by the caller and skipped here.
pub fn parse_run_args(args: &[String]) -> Result<RunOptions, String> {
    let mut options = RunOptions::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--output" => {
                let path = args.get(i + 1).ok_or("Missing value for --output")?;
                options.sink = SinkChoice::JsonLines(PathBuf::from(path));
                i += 2;
            }
            "--log-format" => {
                let format = args.get(i + 1).ok_or("Missing value for --log-format")?;
                options.log_format = format.parse::<LogFormat>().map_err(|e| format!("{}", e))?;
                i += 2;
            }
            "--config" => i += 2,
            other => return Err(format!("Unknown argument: {}", other)),
        }
    }
    Ok(options)
}

/// Run the agent until Ctrl-C, then push a final harvest.
///
/// Returns 0 on clean shutdown, 2 on configuration error, 1 otherwise.
pub async fn run_agent(config: AgentConfig, options: RunOptions) -> i32 {
    let log_config = LogConfig {
        format: options.log_format,
        ..LogConfig::for_agent(config.verbose)
    };
    if let Err(e) = telemetry::init_logging(&log_config) {
        eprintln!("Logging setup failed: {}", e);
    }
    telemetry::init_metrics();

    let sink: Arc<dyn ReportSink> = match &options.sink {
        SinkChoice::Tracing => Arc::new(TracingSink),
        SinkChoice::JsonLines(path) => Arc::new(JsonLinesSink::new(path.clone())),
    };

    let agent = Arc::new(Agent::new(config));
    let reporter = match agent.start(sink) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to start agent: {}", e);
            return 2;
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("Failed to listen for Ctrl-C: {}", e);
    }
    eprintln!("Shutdown signal received, pushing final harvest...");
    agent.shutdown();

    match reporter.await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Reporting task failed: {}", e);
            1
        }
    }
}
