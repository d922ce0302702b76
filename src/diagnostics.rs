use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::scheduler::run_fixed_interval;
use crate::session::Session;
use crate::time_provider::TimeProvider;

const BENCH_DURATION: Duration = Duration::from_secs(1);

/// Rolling frame pacing statistics.
pub struct FrameStats {
    total_frames: u64,
    late_frames: u64,
    last_frame_ms: f64,
    target_frame_ms: f64,
    window: VecDeque<f64>,
    window_size: usize,
    frame_time_histogram: [u64; 6],
}

impl FrameStats {
    pub fn new(window_size: usize, target_frame: Duration) -> Self {
        let window_size = window_size.max(1);
        Self {
            total_frames: 0,
            late_frames: 0,
            last_frame_ms: 0.0,
            target_frame_ms: target_frame.as_secs_f64() * 1_000.0,
            window: VecDeque::with_capacity(window_size),
            window_size,
            frame_time_histogram: [0; 6],
        }
    }

    pub fn record_frame(&mut self, frame_ms: f64) {
        self.total_frames += 1;
        self.last_frame_ms = frame_ms;
        // Allow a little scheduler slack before calling a frame late.
        if frame_ms > self.target_frame_ms * 1.5 {
            self.late_frames += 1;
        }

        if self.window.len() == self.window_size {
            let _ = self.window.pop_front();
        }
        self.window.push_back(frame_ms);
        self.update_histogram(frame_ms);
    }

    pub fn instant_fps(&self) -> f64 {
        if self.last_frame_ms <= 0.0 {
            return 0.0;
        }
        1_000.0 / self.last_frame_ms
    }

    pub fn rolling_fps(&self) -> f64 {
        let total_ms: f64 = self.window.iter().sum();
        if self.window.is_empty() || total_ms <= 0.0 {
            return 0.0;
        }
        self.window.len() as f64 * 1_000.0 / total_ms
    }

    pub fn late_frames(&self) -> u64 {
        self.late_frames
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn histogram(&self) -> [u64; 6] {
        self.frame_time_histogram
    }

    fn update_histogram(&mut self, ms: f64) {
        let bucket = if ms <= 2.0 {
            0
        } else if ms <= 4.17 {
            1
        } else if ms <= 8.33 {
            2
        } else if ms <= 16.67 {
            3
        } else if ms <= 33.33 {
            4
        } else {
            5
        };
        self.frame_time_histogram[bucket] += 1;
    }
}

/// Prints the rehydrated state, then renders it at `fps` for a second without
/// advancing or firing anything and reports how evenly the frames landed.
pub fn run_diagnostics(
    session: &Session,
    provider: &dyn TimeProvider,
    fps: u16,
    state_path: &str,
) -> Result<()> {
    let interval = Duration::from_secs_f64(1.0 / f64::from(fps.max(1)));
    println!("N Clock diagnostics");
    println!("State file: {state_path}");
    println!("Time source: {}", provider.label());
    println!("Hours per day: {}", session.hours_per_day());
    println!("Mode: {}", session.mode());
    println!(
        "Stopwatch: {} ({} laps)",
        session.stopwatch_display(),
        session.laps().len()
    );
    println!("Alarms: {}", session.alarms().len());
    for alarm in session.alarms() {
        println!(
            "  {} {} [{}]",
            alarm.label(),
            alarm.id,
            if alarm.enabled { "on" } else { "off" }
        );
    }

    println!("Requested tick rate: {fps} FPS");
    let mut stats = FrameStats::new(512, interval);
    let mut display = String::new();
    let deadline = Instant::now() + BENCH_DURATION;
    run_fixed_interval(provider, interval, |sample, tick| {
        stats.record_frame(tick.dt_ms);
        display = session.render(&sample.local);
        Ok(if Instant::now() >= deadline {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        })
    });

    println!("Display now: {display}");
    println!("Pacing summary:");
    println!("  Frames: {}", stats.total_frames());
    println!("  Late: {}", stats.late_frames());
    println!("  Instant FPS: {:.1}", stats.instant_fps());
    println!("  Rolling FPS: {:.1}", stats.rolling_fps());
    println!("  Frame-time histogram buckets (<=2, <=4.17, <=8.33, <=16.67, <=33.33, >33.33 ms):");
    println!("  {:?}", stats.histogram());
    Ok(())
}

pub fn sleep_until(deadline: Instant) {
    let now = Instant::now();
    if now >= deadline {
        return;
    }

    let mut remaining = deadline.saturating_duration_since(now);
    if remaining > Duration::from_millis(1) {
        std::thread::sleep(remaining - Duration::from_micros(250));
    }

    loop {
        let current = Instant::now();
        if current >= deadline {
            break;
        }
        remaining = deadline.saturating_duration_since(current);
        if remaining > Duration::from_micros(50) {
            std::thread::yield_now();
        } else {
            std::hint::spin_loop();
        }
    }
}
