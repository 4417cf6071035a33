//! Errors raised when reading instruments and system sources.

use thiserror::Error;

use crate::instrument::InstrumentKind;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    #[error("Metric '{0}' is not registered")]
    NotRegistered(String),

    #[error("Metric '{key}' is a {found}, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: InstrumentKind,
        found: InstrumentKind,
    },

    #[error("Unsupported statistic '{stat}' for {kind}")]
    UnsupportedStatistic { kind: InstrumentKind, stat: String },

    #[error("Percentile {0} is outside [0, 1]")]
    InvalidPercentile(f64),

    #[error("Metric '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("System metric '{key}' is not implemented for {platform}")]
    PlatformUnsupported { key: String, platform: &'static str },

    #[error("System data error: {0}")]
    SystemData(String),
}
