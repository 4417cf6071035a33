//! Exponentially weighted rate meter.
//!
//! Moving averages advance in fixed 5 second ticks. Ticks are applied lazily
//! whenever the meter is marked or read, so meters need no background thread.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Interval between moving-average ticks.
pub const TICK_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound on ticks replayed one by one after a long idle period. Idle
/// ticks past this bound are applied as a single closed-form decay.
const MAX_CATCH_UP_TICKS: u64 = 720;

/// Single exponentially weighted moving average, in events per second.
#[derive(Debug, Clone)]
struct Ewma {
    alpha: f64,
    rate: f64,
    initialized: bool,
}

impl Ewma {
    fn for_minutes(minutes: f64) -> Self {
        let alpha = 1.0 - (-(TICK_INTERVAL.as_secs_f64()) / 60.0 / minutes).exp();
        Self {
            alpha,
            rate: 0.0,
            initialized: false,
        }
    }

    /// Apply `ticks` ticks that saw no events.
    fn decay(&mut self, ticks: u64) {
        if self.initialized {
            self.rate *= (1.0 - self.alpha).powf(ticks as f64);
        }
    }

    fn tick(&mut self, events: i64) {
        let instant_rate = events as f64 / TICK_INTERVAL.as_secs_f64();
        if self.initialized {
            self.rate += self.alpha * (instant_rate - self.rate);
        } else {
            self.rate = instant_rate;
            self.initialized = true;
        }
    }
}

#[derive(Debug)]
struct MeterState {
    windows: [Ewma; 3],
    uncounted: i64,
    last_tick: Instant,
}

impl MeterState {
    fn advance(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_tick);
        let ticks = (elapsed.as_nanos() / TICK_INTERVAL.as_nanos()) as u64;
        if ticks == 0 {
            return;
        }
        let replay = ticks.min(MAX_CATCH_UP_TICKS);
        let mut events = std::mem::take(&mut self.uncounted);
        for _ in 0..replay {
            for window in self.windows.iter_mut() {
                window.tick(events);
            }
            events = 0;
        }
        if ticks > replay {
            for window in self.windows.iter_mut() {
                window.decay(ticks - replay);
            }
        }
        self.last_tick += TICK_INTERVAL * ticks as u32;
    }
}

/// Event meter with 1, 5 and 15 minute moving averages.
#[derive(Debug)]
pub struct Meter {
    count: AtomicI64,
    started: Instant,
    state: Mutex<MeterState>,
}

impl Meter {
    pub fn new() -> Self {
        Self::started_at(Instant::now())
    }

    pub(crate) fn started_at(started: Instant) -> Self {
        Self {
            count: AtomicI64::new(0),
            started,
            state: Mutex::new(MeterState {
                windows: [
                    Ewma::for_minutes(1.0),
                    Ewma::for_minutes(5.0),
                    Ewma::for_minutes(15.0),
                ],
                uncounted: 0,
                last_tick: started,
            }),
        }
    }

    /// Record `n` events.
    pub fn mark(&self, n: i64) {
        self.mark_at(n, Instant::now());
    }

    pub(crate) fn mark_at(&self, n: i64, now: Instant) {
        self.count.fetch_add(n, Ordering::Relaxed);
        let mut state = self.state.lock();
        state.advance(now);
        state.uncounted += n;
    }

    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn rate1(&self) -> f64 {
        self.rate_at(0, Instant::now())
    }

    pub fn rate5(&self) -> f64 {
        self.rate_at(1, Instant::now())
    }

    pub fn rate15(&self) -> f64 {
        self.rate_at(2, Instant::now())
    }

    /// Mean rate since the meter was created.
    pub fn rate_mean(&self) -> f64 {
        self.rate_mean_at(Instant::now())
    }

    pub(crate) fn rate_at(&self, window: usize, now: Instant) -> f64 {
        let mut state = self.state.lock();
        state.advance(now);
        state.windows[window].rate
    }

    pub(crate) fn rate_mean_at(&self, now: Instant) -> f64 {
        let count = self.count();
        if count == 0 {
            return 0.0;
        }
        let elapsed = now.saturating_duration_since(self.started).as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        count as f64 / elapsed
    }
}

impl Default for Meter {
    fn default() -> Self {
        Self::new()
    }
}
