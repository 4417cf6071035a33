//! Reporting sinks.
//!
//! A sink receives one [`HarvestBatch`] per reporting tick. Transport,
//! retry and backoff belong to the sink; the agent only logs failures and
//! keeps accumulating until the next tick.

mod json_lines;
mod memory;
mod tracing_sink;

pub use json_lines::JsonLinesSink;
pub use memory::MemorySink;
pub use tracing_sink::TracingSink;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::metric::MetricValue;

/// Values of one component harvested on one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestBatch {
    pub component: String,
    pub guid: String,
    pub agent_version: String,
    pub instance_id: Uuid,
    pub host: String,
    pub timestamp: DateTime<Utc>,
    /// Seconds covered by this batch (the reporting interval).
    pub duration_secs: u64,
    pub metrics: Vec<MetricValue>,
}

impl HarvestBatch {
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.metrics
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.value)
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Sink I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize batch: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Batch rejected: {0}")]
    Rejected(String),
}

impl SinkError {
    /// Short label for self-metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Serialize(_) => "serialize",
            Self::Rejected(_) => "rejected",
        }
    }
}

/// Destination for harvested batches.
#[async_trait::async_trait]
pub trait ReportSink: Send + Sync {
    async fn push(&self, batch: &HarvestBatch) -> Result<(), SinkError>;
}
