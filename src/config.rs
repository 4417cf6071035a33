//! Agent configuration from environment variables and TOML.
//!
//! Values are read from `HARVEST_*` environment variables with sensible
//! defaults. Invalid values fall back to defaults without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `HARVEST_LICENSE` | (empty) | Reporting credential; required to run |
//! | `HARVEST_NAME` | `Harvest Agent` | Component display name |
//! | `HARVEST_GUID` | `com.example.HarvestAgent` | Component identifier |
//! | `HARVEST_REPORT_INTERVAL` | 60 | Reporting interval (secs) |
//! | `HARVEST_GC_POLL_INTERVAL` | 10 | Collector sampler interval (secs) |
//! | `HARVEST_MEMORY_POLL_INTERVAL` | 60 | Memory sampler interval (secs) |
//! | `HARVEST_COLLECT_GC` | true | Collector pause metrics |
//! | `HARVEST_COLLECT_MEMORY` | true | Allocator metrics |
//! | `HARVEST_COLLECT_HTTP` | false | HTTP throughput metrics |
//! | `HARVEST_COLLECT_HTTP_STATUSES` | false | HTTP status counters |
//! | `HARVEST_VERBOSE` | false | Lifecycle debug logging |

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const DEFAULT_AGENT_NAME: &str = "Harvest Agent";
pub const DEFAULT_AGENT_GUID: &str = "com.example.HarvestAgent";
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_REPORT_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_GC_POLL_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_MEMORY_POLL_INTERVAL_SECS: u64 = 60;
const MIN_INTERVAL_SECS: u64 = 1;
/// Longest accepted report or poll interval.
pub const MAX_INTERVAL_SECS: u64 = 86_400;

pub const ENV_LICENSE: &str = "HARVEST_LICENSE";
pub const ENV_NAME: &str = "HARVEST_NAME";
pub const ENV_GUID: &str = "HARVEST_GUID";
pub const ENV_REPORT_INTERVAL: &str = "HARVEST_REPORT_INTERVAL";
pub const ENV_GC_POLL_INTERVAL: &str = "HARVEST_GC_POLL_INTERVAL";
pub const ENV_MEMORY_POLL_INTERVAL: &str = "HARVEST_MEMORY_POLL_INTERVAL";
pub const ENV_COLLECT_GC: &str = "HARVEST_COLLECT_GC";
pub const ENV_COLLECT_MEMORY: &str = "HARVEST_COLLECT_MEMORY";
pub const ENV_COLLECT_HTTP: &str = "HARVEST_COLLECT_HTTP";
pub const ENV_COLLECT_HTTP_STATUSES: &str = "HARVEST_COLLECT_HTTP_STATUSES";
pub const ENV_VERBOSE: &str = "HARVEST_VERBOSE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    Parse(String),

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Agent settings. TOML keys match the field names; intervals are seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    pub guid: String,
    pub version: String,
    pub license: String,
    #[serde(with = "duration_secs")]
    pub report_interval: Duration,
    pub verbose: bool,
    pub collect_gc: bool,
    pub collect_memory: bool,
    pub collect_http: bool,
    pub collect_http_statuses: bool,
    #[serde(with = "duration_secs")]
    pub gc_poll_interval: Duration,
    #[serde(with = "duration_secs")]
    pub memory_poll_interval: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_AGENT_NAME.to_string(),
            guid: DEFAULT_AGENT_GUID.to_string(),
            version: AGENT_VERSION.to_string(),
            license: String::new(),
            report_interval: Duration::from_secs(DEFAULT_REPORT_INTERVAL_SECS),
            verbose: false,
            collect_gc: true,
            collect_memory: true,
            collect_http: false,
            collect_http_statuses: false,
            gc_poll_interval: Duration::from_secs(DEFAULT_GC_POLL_INTERVAL_SECS),
            memory_poll_interval: Duration::from_secs(DEFAULT_MEMORY_POLL_INTERVAL_SECS),
        }
    }
}

/// Serializable summary with the license reduced to a fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveConfig {
    pub name: String,
    pub guid: String,
    pub version: String,
    pub license_fingerprint: Option<String>,
    pub report_interval_secs: u64,
    pub gc_poll_interval_secs: u64,
    pub memory_poll_interval_secs: u64,
    pub verbose: bool,
    pub collect_gc: bool,
    pub collect_memory: bool,
    pub collect_http: bool,
    pub collect_http_statuses: bool,
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a boolean env var (`1/0`, `true/false`, `yes/no`, `on/off`).
fn parse_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

fn parse_string(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(val) if !val.trim().is_empty() => val.trim().to_string(),
        _ => default.to_string(),
    }
}

fn env_interval(key: &str, current: Duration) -> Duration {
    Duration::from_secs(parse_u64(key, current.as_secs()))
}

fn floor_interval(value: Duration) -> Duration {
    value.max(Duration::from_secs(MIN_INTERVAL_SECS))
}

/// Load configuration from environment variables over the defaults.
pub fn load() -> AgentConfig {
    AgentConfig::default().apply_env()
}

/// Load a TOML file, then apply environment overrides.
pub fn load_from_path(path: &Path) -> Result<AgentConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(AgentConfig::from_toml_str(&raw)?.apply_env())
}

impl AgentConfig {
    /// Parse TOML; missing keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        Ok(config.with_floors())
    }

    /// Override fields from `HARVEST_*` variables that are set and valid.
    pub fn apply_env(self) -> Self {
        let config = Self {
            license: parse_string(ENV_LICENSE, &self.license),
            name: parse_string(ENV_NAME, &self.name),
            guid: parse_string(ENV_GUID, &self.guid),
            report_interval: env_interval(ENV_REPORT_INTERVAL, self.report_interval),
            gc_poll_interval: env_interval(ENV_GC_POLL_INTERVAL, self.gc_poll_interval),
            memory_poll_interval: env_interval(ENV_MEMORY_POLL_INTERVAL, self.memory_poll_interval),
            collect_gc: parse_bool(ENV_COLLECT_GC, self.collect_gc),
            collect_memory: parse_bool(ENV_COLLECT_MEMORY, self.collect_memory),
            collect_http: parse_bool(ENV_COLLECT_HTTP, self.collect_http),
            collect_http_statuses: parse_bool(ENV_COLLECT_HTTP_STATUSES, self.collect_http_statuses),
            verbose: parse_bool(ENV_VERBOSE, self.verbose),
            version: self.version,
        };
        config.with_floors()
    }

    fn with_floors(mut self) -> Self {
        self.report_interval = floor_interval(self.report_interval);
        self.gc_poll_interval = floor_interval(self.gc_poll_interval);
        self.memory_poll_interval = floor_interval(self.memory_poll_interval);
        self
    }

    pub fn license_fingerprint(&self) -> Option<String> {
        if self.license.is_empty() {
            return None;
        }
        let digest = Sha256::digest(self.license.as_bytes());
        Some(hex::encode(&digest[..8]))
    }

    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            name: self.name.clone(),
            guid: self.guid.clone(),
            version: self.version.clone(),
            license_fingerprint: self.license_fingerprint(),
            report_interval_secs: self.report_interval.as_secs(),
            gc_poll_interval_secs: self.gc_poll_interval.as_secs(),
            memory_poll_interval_secs: self.memory_poll_interval.as_secs(),
            verbose: self.verbose,
            collect_gc: self.collect_gc,
            collect_memory: self.collect_memory,
            collect_http: self.collect_http,
            collect_http_statuses: self.collect_http_statuses,
        }
    }

    /// Intervals above [`MAX_INTERVAL_SECS`]; the agent refuses to start
    /// with any of these.
    pub fn interval_errors(&self) -> Vec<String> {
        [
            ("report interval", self.report_interval),
            ("gc poll interval", self.gc_poll_interval),
            ("memory poll interval", self.memory_poll_interval),
        ]
        .into_iter()
        .filter(|(_, interval)| interval.as_secs() > MAX_INTERVAL_SECS)
        .map(|(label, interval)| {
            format!(
                "{} ({}s) exceeds the {}s maximum",
                label,
                interval.as_secs(),
                MAX_INTERVAL_SECS
            )
        })
        .collect()
    }

    /// Human-readable problems that would stop or degrade the agent.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = self.interval_errors();
        if self.license.is_empty() {
            warnings.push(format!("{} is not set; the agent will refuse to run", ENV_LICENSE));
        }
        if self.guid.is_empty() {
            warnings.push("guid is empty".to_string());
        }
        if self.collect_gc && self.gc_poll_interval > self.report_interval {
            warnings.push(format!(
                "gc poll interval ({}s) exceeds report interval ({}s)",
                self.gc_poll_interval.as_secs(),
                self.report_interval.as_secs()
            ));
        }
        if self.collect_http_statuses && !self.collect_http {
            warnings.push("HTTP status counters enabled without HTTP throughput".to_string());
        }
        warnings
    }
}
