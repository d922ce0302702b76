use std::io::{self, Write};
use std::ops::ControlFlow;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::alert::{AlarmEffects, TerminalEffects, fire_alarm};
use crate::scheduler::run_fixed_interval;
use crate::session::Session;
use crate::time_provider::TimeProvider;

pub struct TerminalOptions {
    pub fps: u16,
    pub max_ticks: u64,
    pub notifications: bool,
}

/// Headless host: ticks on a fixed interval and prints the display whenever
/// it changes. Runs until `max_ticks` (0 = forever) or until stdout goes away.
pub fn run_terminal(
    session: &mut Session,
    provider: &dyn TimeProvider,
    options: &TerminalOptions,
) -> Result<()> {
    info!(
        fps = options.fps,
        max_ticks = options.max_ticks,
        mode = %session.mode(),
        "headless loop starting"
    );
    let mut effects = TerminalEffects::new(io::stdout());
    drive(session, provider, options, &mut effects, io::stdout());
    session.save_all();
    Ok(())
}

fn drive<W: Write>(
    session: &mut Session,
    provider: &dyn TimeProvider,
    options: &TerminalOptions,
    effects: &mut dyn AlarmEffects,
    mut out: W,
) {
    let interval = Duration::from_secs_f64(1.0 / f64::from(options.fps.max(1)));
    let mut last_display = String::new();
    run_fixed_interval(provider, interval, |sample, tick| {
        let finished = options.max_ticks > 0 && tick.index >= options.max_ticks;
        let report = session.tick(sample, tick.dt_ms);
        for alarm in &report.fired {
            fire_alarm(&mut *effects, alarm, options.notifications);
        }
        if report.display != last_display {
            if let Err(err) = writeln!(out, "{}", report.display).and_then(|()| out.flush()) {
                warn!(tick = tick.index, "display output closed, stopping: {err}");
                return Ok(ControlFlow::Break(()));
            }
            last_display = report.display;
        }

        Ok(if finished {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        })
    });
}
