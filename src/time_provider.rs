use std::time::Instant;

use chrono::{Local, NaiveDateTime};

/// One reading of both clocks the engine needs: local wall-clock time for the
/// virtual dial and alarms, and a monotonic millisecond counter for frame deltas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeSample {
    pub local: NaiveDateTime,
    pub monotonic_ms: f64,
}

pub trait TimeProvider {
    fn now(&self) -> TimeSample;
    fn label(&self) -> &'static str;
}

pub struct SystemTimeProvider {
    monotonic_anchor: Instant,
}

impl SystemTimeProvider {
    pub fn new() -> Self {
        Self {
            monotonic_anchor: Instant::now(),
        }
    }
}

impl Default for SystemTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> TimeSample {
        TimeSample {
            local: Local::now().naive_local(),
            monotonic_ms: self.monotonic_anchor.elapsed().as_secs_f64() * 1_000.0,
        }
    }

    fn label(&self) -> &'static str {
        "SYSTEM_LOCAL"
    }
}
