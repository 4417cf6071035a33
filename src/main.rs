// Copyright 2026 Harvest Agent Contributors
// SPDX-License-Identifier: Apache-2.0

//! Harvest agent CLI entry point.
//!
//! ## CLI Subcommands
//!
//! - `harvest-agent-cli run` - Start the agent and report until Ctrl-C
//! - `harvest-agent-cli config show|defaults|validate` - Inspect configuration
//! - `harvest-agent-cli version` - Print the version

use std::process::ExitCode;

use harvest_agent::cli::{config_cmd, load_cli_config, parse_run_args, run_agent};

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");

    match command {
        "run" => {
            let rest = &args[2..];
            let options = match parse_run_args(rest) {
                Ok(options) => options,
                Err(e) => {
                    eprintln!("{}", e);
                    print_command_help("run");
                    return ExitCode::FAILURE;
                }
            };
            let config = match load_cli_config(rest) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Configuration error: {}", e);
                    return ExitCode::from(2u8);
                }
            };
            ExitCode::from(run_agent(config, options).await as u8)
        }
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            let rest = args.get(3..).unwrap_or(&[]);
            if subcommand == "defaults" {
                config_cmd::run_defaults();
                return ExitCode::SUCCESS;
            }
            let config = match load_cli_config(rest) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Configuration error: {}", e);
                    return ExitCode::from(2u8);
                }
            };
            match subcommand {
                "show" => {
                    let json = rest.iter().any(|a| a == "--json");
                    ExitCode::from(config_cmd::run_show(&config, json) as u8)
                }
                "validate" => ExitCode::from(config_cmd::run_validate(&config) as u8),
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_command_help("config");
                    ExitCode::FAILURE
                }
            }
        }
        "help" | "--help" | "-h" => {
            if let Some(subcommand) = args.get(2) {
                print_command_help(subcommand);
            } else {
                print_usage();
            }
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("harvest-agent {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "harvest-agent - in-process telemetry agent v{}

USAGE:
    harvest-agent-cli <COMMAND> [OPTIONS]

COMMANDS:
    run          Start the agent and report until Ctrl-C
    config       Inspect configuration (show, defaults, validate)
    version      Show version information
    help         Show this help message

ENVIRONMENT:
    HARVEST_LICENSE                Reporting credential (required for run)
    HARVEST_NAME                   Component name
    HARVEST_GUID                   Component identifier
    HARVEST_REPORT_INTERVAL        Reporting interval in seconds (default: 60)
    HARVEST_GC_POLL_INTERVAL       Collector poll interval in seconds (default: 10)
    HARVEST_MEMORY_POLL_INTERVAL   Memory poll interval in seconds (default: 60)
    HARVEST_COLLECT_GC             Collector metrics (default: true)
    HARVEST_COLLECT_MEMORY         Allocator metrics (default: true)
    HARVEST_COLLECT_HTTP           HTTP throughput metrics (default: false)
    HARVEST_COLLECT_HTTP_STATUSES  HTTP status counters (default: false)
    HARVEST_VERBOSE                Lifecycle debug logging (default: false)

EXIT CODES:
    0  Success
    1  Failure
    2  Configuration error
",
        version
    );
}

/// Print detailed help for a specific command.
fn print_command_help(command: &str) {
    match command {
        "run" => {
            eprintln!(
                "harvest-agent-cli run - Start the agent

USAGE:
    harvest-agent-cli run [OPTIONS]

OPTIONS:
    --config FILE        Load TOML configuration (env vars still override)
    --output FILE        Append batches as JSON lines instead of logging them
    --log-format FORMAT  json (default) or pretty

EXAMPLES:
    HARVEST_LICENSE=key harvest-agent-cli run
    HARVEST_LICENSE=key harvest-agent-cli run --output /var/log/metrics.jsonl
"
            );
        }
        "config" => {
            eprintln!(
                "harvest-agent-cli config - Inspect configuration

USAGE:
    harvest-agent-cli config <SUBCOMMAND> [OPTIONS]

SUBCOMMANDS:
    show           Show effective configuration (--json for JSON)
    validate       Warn about misconfiguration (exit 1 on warnings)
    defaults       Show default configuration

OPTIONS:
    --config FILE  TOML configuration file
"
            );
        }
        _ => {
            eprintln!(
                "No detailed help available for '{}'. Use 'harvest-agent-cli help' for general usage.",
                command
            );
        }
    }
}
