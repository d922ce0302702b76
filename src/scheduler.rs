use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{trace, warn};

use crate::diagnostics::sleep_until;
use crate::time_provider::{TimeProvider, TimeSample};

/// Substituted for frame deltas that cannot be trusted (non-finite or negative).
pub const FALLBACK_FRAME_MS: f64 = 16.0;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SchedulerState {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub index: u64,
    pub dt_ms: f64,
}

/// Sanitizes a raw frame delta. Zero passes through so an idle frame is a no-op.
pub fn clamp_frame_delta(raw_ms: f64) -> f64 {
    if !raw_ms.is_finite() || raw_ms < 0.0 {
        FALLBACK_FRAME_MS
    } else {
        raw_ms
    }
}

/// Turns host frame callbacks into [`Tick`]s. The host owns the timer
/// primitive (display refresh, repaint request, or a fixed interval); this
/// only tracks the previous timestamp and the Idle/Running state.
#[derive(Debug)]
pub struct TickScheduler {
    state: SchedulerState,
    last_ms: f64,
    ticks: u64,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self {
            state: SchedulerState::Idle,
            last_ms: 0.0,
            ticks: 0,
        }
    }

    /// Idempotent; a second call keeps the original anchor.
    pub fn start(&mut self, now_ms: f64) {
        if self.state == SchedulerState::Running {
            return;
        }
        self.state = SchedulerState::Running;
        self.last_ms = now_ms;
        trace!(now_ms, "tick scheduler running");
    }

    pub fn tick(&mut self, now_ms: f64) -> Option<Tick> {
        if self.state != SchedulerState::Running {
            return None;
        }
        let dt_ms = clamp_frame_delta(now_ms - self.last_ms);
        if now_ms.is_finite() {
            self.last_ms = now_ms;
        }
        self.ticks += 1;
        Some(Tick {
            index: self.ticks,
            dt_ms,
        })
    }
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives `hook` on a fixed interval until it breaks. A failing tick is
/// logged and the loop carries on.
pub fn run_fixed_interval<F>(provider: &dyn TimeProvider, interval: Duration, mut hook: F)
where
    F: FnMut(&TimeSample, Tick) -> Result<ControlFlow<()>>,
{
    let mut scheduler = TickScheduler::new();
    scheduler.start(provider.now().monotonic_ms);
    let step = interval.max(Duration::from_millis(1));
    let mut next_frame = Instant::now() + step;
    loop {
        sleep_until(next_frame);
        let sample = provider.now();
        let Some(tick) = scheduler.tick(sample.monotonic_ms) else {
            break;
        };
        match hook(&sample, tick) {
            Ok(ControlFlow::Break(())) => break,
            Ok(ControlFlow::Continue(())) => {}
            Err(err) => warn!(tick = tick.index, "tick failed: {err:#}"),
        }

        let wake = Instant::now();
        next_frame += step;
        if next_frame < wake {
            next_frame = wake + step;
        }
    }
}
