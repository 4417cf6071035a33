//! Statistic selectors, one closed enum per readable instrument kind.
//!
//! Percentile selectors carry their fraction. Names parse from config-style
//! strings: `count`, `max`, `rate1`, `p95`, `percentile:0.999`.

use std::str::FromStr;

use super::MetricError;
use crate::instrument::InstrumentKind;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HistogramStat {
    Count,
    Max,
    Mean,
    Min,
    Percentile(f64),
    StdDev,
    Sum,
    Variance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterStat {
    Count,
    Rate1,
    Rate5,
    Rate15,
    RateMean,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimerStat {
    Count,
    Max,
    Mean,
    Min,
    Percentile(f64),
    Rate1,
    Rate5,
    Rate15,
    RateMean,
    StdDev,
    Sum,
    Variance,
}

/// Reject percentiles outside `[0, 1]` (and NaN).
pub(crate) fn check_percentile(p: f64) -> Result<f64, MetricError> {
    if (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(MetricError::InvalidPercentile(p))
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_ascii_lowercase().replace('_', "")
}

/// Parses `p95`, `p99.9` and `percentile:0.95`.
fn parse_percentile(name: &str) -> Option<Result<f64, MetricError>> {
    if let Some(frac) = name.strip_prefix("percentile:") {
        return Some(
            frac.parse::<f64>()
                .map_err(|_| MetricError::InvalidPercentile(f64::NAN))
                .and_then(check_percentile),
        );
    }
    let digits = name.strip_prefix('p')?;
    let value = digits.parse::<f64>().ok()?;
    Some(check_percentile(value / 100.0))
}

fn unsupported(kind: InstrumentKind, stat: &str) -> MetricError {
    MetricError::UnsupportedStatistic {
        kind,
        stat: stat.to_string(),
    }
}

impl FromStr for HistogramStat {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = normalize(s);
        match name.as_str() {
            "count" => Ok(Self::Count),
            "max" => Ok(Self::Max),
            "mean" => Ok(Self::Mean),
            "min" => Ok(Self::Min),
            "stddev" => Ok(Self::StdDev),
            "sum" => Ok(Self::Sum),
            "variance" => Ok(Self::Variance),
            _ => match parse_percentile(&name) {
                Some(p) => p.map(Self::Percentile),
                None => Err(unsupported(InstrumentKind::Histogram, s)),
            },
        }
    }
}

impl FromStr for MeterStat {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "count" => Ok(Self::Count),
            "rate1" => Ok(Self::Rate1),
            "rate5" => Ok(Self::Rate5),
            "rate15" => Ok(Self::Rate15),
            "ratemean" => Ok(Self::RateMean),
            _ => Err(unsupported(InstrumentKind::Meter, s)),
        }
    }
}

impl FromStr for TimerStat {
    type Err = MetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = normalize(s);
        match name.as_str() {
            "count" => Ok(Self::Count),
            "max" => Ok(Self::Max),
            "mean" => Ok(Self::Mean),
            "min" => Ok(Self::Min),
            "rate1" => Ok(Self::Rate1),
            "rate5" => Ok(Self::Rate5),
            "rate15" => Ok(Self::Rate15),
            "ratemean" => Ok(Self::RateMean),
            "stddev" => Ok(Self::StdDev),
            "sum" => Ok(Self::Sum),
            "variance" => Ok(Self::Variance),
            _ => match parse_percentile(&name) {
                Some(p) => p.map(Self::Percentile),
                None => Err(unsupported(InstrumentKind::Timer, s)),
            },
        }
    }
}
