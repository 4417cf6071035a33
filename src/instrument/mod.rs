//! Measurement instruments.
//!
//! Every instrument is safe for concurrent update from any number of
//! producers and concurrent reads by the harvester. Producers never wait on
//! harvest: counters and gauges are single atomics, histograms and meters
//! hold a short `parking_lot` critical section.

mod counter;
mod gauge;
mod histogram;
mod meter;
mod timer;

use std::fmt;
use std::sync::Arc;

pub use counter::Counter;
pub use gauge::Gauge;
pub use histogram::{Histogram, HistogramSnapshot, DEFAULT_RESERVOIR_SIZE};
pub use meter::{Meter, TICK_INTERVAL};
pub use timer::Timer;

/// The five instrument kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentKind {
    Counter,
    Gauge,
    Histogram,
    Meter,
    Timer,
}

impl InstrumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Histogram => "histogram",
            Self::Meter => "meter",
            Self::Timer => "timer",
        }
    }
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered instrument. Cloning shares the underlying accumulator.
#[derive(Debug, Clone)]
pub enum Instrument {
    Counter(Arc<Counter>),
    Gauge(Arc<Gauge>),
    Histogram(Arc<Histogram>),
    Meter(Arc<Meter>),
    Timer(Arc<Timer>),
}

impl Instrument {
    pub fn counter() -> Self {
        Self::Counter(Arc::new(Counter::new()))
    }

    pub fn gauge() -> Self {
        Self::Gauge(Arc::new(Gauge::new()))
    }

    pub fn histogram() -> Self {
        Self::Histogram(Arc::new(Histogram::new()))
    }

    pub fn meter() -> Self {
        Self::Meter(Arc::new(Meter::new()))
    }

    pub fn timer() -> Self {
        Self::Timer(Arc::new(Timer::new()))
    }

    pub fn kind(&self) -> InstrumentKind {
        match self {
            Self::Counter(_) => InstrumentKind::Counter,
            Self::Gauge(_) => InstrumentKind::Gauge,
            Self::Histogram(_) => InstrumentKind::Histogram,
            Self::Meter(_) => InstrumentKind::Meter,
            Self::Timer(_) => InstrumentKind::Timer,
        }
    }
}

impl From<Arc<Counter>> for Instrument {
    fn from(counter: Arc<Counter>) -> Self {
        Self::Counter(counter)
    }
}

impl From<Arc<Gauge>> for Instrument {
    fn from(gauge: Arc<Gauge>) -> Self {
        Self::Gauge(gauge)
    }
}

impl From<Arc<Histogram>> for Instrument {
    fn from(histogram: Arc<Histogram>) -> Self {
        Self::Histogram(histogram)
    }
}

impl From<Arc<Meter>> for Instrument {
    fn from(meter: Arc<Meter>) -> Self {
        Self::Meter(meter)
    }
}

impl From<Arc<Timer>> for Instrument {
    fn from(timer: Arc<Timer>) -> Self {
        Self::Timer(timer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(Instrument::counter().kind(), InstrumentKind::Counter);
        assert_eq!(Instrument::gauge().kind(), InstrumentKind::Gauge);
        assert_eq!(Instrument::histogram().kind(), InstrumentKind::Histogram);
        assert_eq!(Instrument::meter().kind(), InstrumentKind::Meter);
        assert_eq!(Instrument::timer().kind(), InstrumentKind::Timer);
    }

    #[test]
    fn test_clone_shares_state() {
        let counter = Arc::new(Counter::new());
        let instrument = Instrument::from(counter.clone());
        if let Instrument::Counter(c) = instrument.clone() {
            c.inc(4);
        }
        assert_eq!(counter.count(), 4);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(InstrumentKind::Timer.to_string(), "timer");
    }
}
