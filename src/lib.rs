//! Harvest Agent
//!
//! An in-process telemetry agent. Producers update typed instruments held in
//! a shared [`Registry`]; metric adapters turn registry entries into named,
//! unit-tagged values; the [`Agent`] harvests its [`Component`] on a fixed
//! interval and pushes the batch to a [`ReportSink`].
//!
//! # Layers
//!
//! - `instrument`: counters, gauges, histograms, meters and timers
//! - `registry`: `key -> instrument` mapping with typed statistic getters
//! - `metric`: adapters (`Metric` trait) over registry entries
//! - `component`: ordered adapter list reported as one unit
//! - `tracer`: named timing spans materialized on first use
//! - `runtime`: scheduler, collector, allocator and OS metric families
//! - `http`: handler wrapper recording throughput and status codes
//! - `sink`: reporting destinations
//!
//! ```no_run
//! use std::sync::Arc;
//! use harvest_agent::{Agent, AgentConfig, TracingSink};
//!
//! # async fn demo() -> Result<(), harvest_agent::AgentError> {
//! let config = AgentConfig {
//!     license: "license-key".to_string(),
//!     ..AgentConfig::default()
//! };
//! let agent = Arc::new(Agent::new(config));
//! let reporter = agent.start(Arc::new(TracingSink))?;
//!
//! agent.tracer().trace("startup", || ());
//!
//! agent.shutdown();
//! let _ = reporter.await;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod cli;
pub mod component;
pub mod config;
pub mod http;
pub mod instrument;
pub mod metric;
pub mod registry;
pub mod runtime;
pub mod sink;
pub mod telemetry;
pub mod tracer;

pub use agent::{Agent, AgentError};
pub use component::{Component, Harvest, HarvestFailure};
pub use config::{AgentConfig, ConfigError, EffectiveConfig};
pub use http::{HttpHandler, InstrumentedHandler, RecordedResponse, ResponseWriter};
pub use instrument::{Counter, Gauge, Histogram, Instrument, InstrumentKind, Meter, Timer};
pub use metric::{FnMetric, Metric, MetricValue};
pub use registry::{HistogramStat, MeterStat, MetricError, Registry, TimerStat};
pub use sink::{HarvestBatch, JsonLinesSink, MemorySink, ReportSink, SinkError, TracingSink};
pub use tracer::{Trace, TraceTransaction, Tracer};
