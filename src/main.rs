mod alarm;
mod alert;
mod diagnostics;
mod engine;
mod error;
mod scheduler;
mod session;
mod store;
mod time_provider;
mod ui;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::alarm::model::parse_alarm_time;
use crate::session::{Mode, Session};
use crate::store::{FileStore, MemoryStore, PersistentStore};
use crate::time_provider::{SystemTimeProvider, TimeProvider};
use crate::ui::app::{GuiOptions, run_gui};
use crate::ui::terminal::{TerminalOptions, run_terminal};

const HEADLESS_DEFAULT_FPS: u16 = 60;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliMode {
    Clock,
    Stopwatch,
    Alarm,
}

impl From<CliMode> for Mode {
    fn from(value: CliMode) -> Self {
        match value {
            CliMode::Clock => Mode::Clock,
            CliMode::Stopwatch => Mode::Stopwatch,
            CliMode::Alarm => Mode::Alarm,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "nclock",
    version,
    about = "Clock with an adjustable day length, a stopwatch and alarms"
)]
struct Cli {
    #[arg(long, default_value = "nclock_state.json")]
    state: PathBuf,

    /// Keep state in memory only; nothing is read from or written to disk.
    #[arg(long)]
    no_persist: bool,

    /// Fixed tick rate. Without it the window repaints at the display refresh rate.
    #[arg(long)]
    fps: Option<u16>,

    /// Hours in one virtual day (1-48), saved to the state file.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=48))]
    hours: Option<u32>,

    #[arg(long, value_enum)]
    mode: Option<CliMode>,

    /// Add an alarm at HH:MM before starting. Repeatable.
    #[arg(long = "add-alarm", value_name = "HH:MM")]
    add_alarm: Vec<String>,

    /// Alarm notifications are allowed.
    #[arg(long)]
    notifications: bool,

    /// Run in the terminal instead of opening a window.
    #[arg(long)]
    headless: bool,

    /// Stop the headless loop after this many ticks (0 runs forever).
    #[arg(long, default_value_t = 0)]
    ticks: u64,

    #[arg(long)]
    diagnostics: bool,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("NCLOCK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    if cli.fps == Some(0) {
        bail!("--fps must be greater than zero");
    }

    let store: Box<dyn PersistentStore> = if cli.no_persist {
        info!("persistence disabled");
        Box::new(MemoryStore::new())
    } else {
        let store = FileStore::open(&cli.state);
        info!(path = %store.path().display(), "state file opened");
        Box::new(store)
    };
    let mut session = Session::restore(store);

    let mut alarm_times = Vec::with_capacity(cli.add_alarm.len());
    for input in &cli.add_alarm {
        let time =
            parse_alarm_time(input).with_context(|| format!("failed to add alarm '{input}'"))?;
        alarm_times.push(time);
    }

    if let Some(hours) = cli.hours {
        session
            .set_hours_per_day(hours)
            .context("failed to apply --hours")?;
    }
    if let Some(mode) = cli.mode {
        session.set_mode(mode.into());
    }
    for (hour, minute) in alarm_times {
        let alarm = session
            .add_alarm(hour, minute)
            .with_context(|| format!("failed to add alarm {hour:02}:{minute:02}"))?;
        println!("Added alarm {} ({})", alarm.label(), alarm.id);
    }

    let provider = SystemTimeProvider::new();
    if cli.diagnostics {
        let fps = cli.fps.unwrap_or(HEADLESS_DEFAULT_FPS);
        diagnostics::run_diagnostics(&session, &provider, fps, &cli.state.display().to_string())?;
        return Ok(());
    }

    if cli.headless {
        return run_terminal(
            &mut session,
            &provider,
            &TerminalOptions {
                fps: cli.fps.unwrap_or(HEADLESS_DEFAULT_FPS),
                max_ticks: cli.ticks,
                notifications: cli.notifications,
            },
        );
    }

    let provider: Box<dyn TimeProvider> = Box::new(provider);
    run_gui(
        session,
        provider,
        GuiOptions {
            fps: cli.fps,
            notifications: cli.notifications,
        },
    )
}
