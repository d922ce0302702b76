use std::fmt;
use std::str::FromStr;

use chrono::{Local, NaiveDateTime, Timelike};
use tracing::{debug, info, warn};

use crate::alarm::matcher::AlarmMatcher;
use crate::alarm::model::{
    Alarm, generate_alarm_id, parse_alarm_list, parse_alarm_time, serialize_alarm_list,
};
use crate::engine::scale::{
    MAX_HOURS_PER_DAY, MIN_HOURS_PER_DAY, ScaleConfig, compute_virtual_clock, seconds_of_day,
};
use crate::engine::stopwatch::{LapHistory, StopwatchState, advance_stopwatch, format_stopwatch};
use crate::error::CommandError;
use crate::store::PersistentStore;
use crate::time_provider::TimeSample;

pub const KEY_HOURS: &str = "nclock_hours";
pub const KEY_MODE: &str = "nclock_mode";
pub const KEY_STOPWATCH_ELAPSED: &str = "nclock_sw_elapsed";
pub const KEY_STOPWATCH_LAPS: &str = "nclock_sw_laps";
pub const KEY_ALARMS: &str = "nclock_alarms";

/// Real (unscaled) tick time between full-state flushes.
pub const FLUSH_INTERVAL_MS: f64 = 2_000.0;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum Mode {
    #[default]
    Clock,
    Stopwatch,
    Alarm,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Clock, Mode::Stopwatch, Mode::Alarm];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Clock => "clock",
            Mode::Stopwatch => "stopwatch",
            Mode::Alarm => "alarm",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Mode::Clock => "Clock",
            Mode::Stopwatch => "Stopwatch",
            Mode::Alarm => "Alarm",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "clock" => Ok(Mode::Clock),
            "stopwatch" => Ok(Mode::Stopwatch),
            "alarm" => Ok(Mode::Alarm),
            other => Err(format!("unknown mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub display: String,
    pub fired: Vec<Alarm>,
}

/// Everything the widget knows, owned in one place. Host adapters call the
/// mutators for user input and [`Session::tick`] once per frame.
pub struct Session {
    store: Box<dyn PersistentStore>,
    scale: ScaleConfig,
    mode: Mode,
    stopwatch: StopwatchState,
    laps: LapHistory,
    alarms: Vec<Alarm>,
    matcher: AlarmMatcher,
    next_alarm_id: u64,
    since_flush_ms: f64,
    last_local: Option<NaiveDateTime>,
}

impl Session {
    /// Rehydrates from `store`, substituting defaults for anything missing or
    /// malformed.
    pub fn restore(store: Box<dyn PersistentStore>) -> Self {
        let scale = ScaleConfig::from_persisted(store.get(KEY_HOURS).as_deref());
        let mode = match store.get(KEY_MODE) {
            Some(raw) => raw.parse::<Mode>().unwrap_or_else(|err| {
                warn!("{err}, falling back to clock");
                Mode::Clock
            }),
            None => Mode::Clock,
        };
        let stopwatch = StopwatchState::from_persisted(store.get(KEY_STOPWATCH_ELAPSED).as_deref());
        let laps = LapHistory::from_persisted(store.get(KEY_STOPWATCH_LAPS).as_deref());
        let alarms = store
            .get(KEY_ALARMS)
            .map(|raw| parse_alarm_list(&raw))
            .unwrap_or_default();
        debug!(
            hours_per_day = scale.hours_per_day(),
            %mode,
            elapsed_ms = stopwatch.elapsed_ms,
            laps = laps.len(),
            alarms = alarms.len(),
            "session restored"
        );

        Self {
            store,
            scale,
            mode,
            stopwatch,
            laps,
            alarms,
            matcher: AlarmMatcher::new(),
            next_alarm_id: 1,
            since_flush_ms: 0.0,
            last_local: None,
        }
    }

    pub fn hours_per_day(&self) -> u8 {
        self.scale.hours_per_day()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn stopwatch(&self) -> StopwatchState {
        self.stopwatch
    }

    pub fn laps(&self) -> &LapHistory {
        &self.laps
    }

    pub fn alarms(&self) -> &[Alarm] {
        &self.alarms
    }

    pub fn stopwatch_display(&self) -> String {
        format_stopwatch(self.stopwatch.elapsed_ms)
    }

    /// Display string for the active mode at wall-clock `local`. Alarm mode
    /// shows the real time the alarms are matched against.
    pub fn render(&self, local: &NaiveDateTime) -> String {
        match self.mode {
            Mode::Clock => {
                compute_virtual_clock(seconds_of_day(local.time()), self.hours_per_day())
                    .to_string()
            }
            Mode::Stopwatch => self.stopwatch_display(),
            Mode::Alarm => format!(
                "{:02}:{:02}:{:02}",
                local.hour(),
                local.minute(),
                local.second()
            ),
        }
    }

    /// Runs one frame: advance the stopwatch, match alarms against real local
    /// time, then render the active mode.
    pub fn tick(&mut self, sample: &TimeSample, dt_ms: f64) -> TickReport {
        let hours = self.scale.hours_per_day();
        self.stopwatch = advance_stopwatch(self.stopwatch, dt_ms, hours);
        let previous = self.last_local.replace(sample.local);

        let fired = self.matcher.matches(&self.alarms, previous, sample.local);

        let display = self.render(&sample.local);

        if dt_ms.is_finite() && dt_ms > 0.0 {
            self.since_flush_ms += dt_ms;
        }
        if self.since_flush_ms >= FLUSH_INTERVAL_MS {
            self.save_all();
        }

        TickReport { display, fired }
    }

    pub fn set_hours_per_day(&mut self, hours: u32) -> Result<(), CommandError> {
        let scale = u8::try_from(hours)
            .ok()
            .and_then(ScaleConfig::new)
            .ok_or(CommandError::HoursOutOfRange {
                value: hours,
                min: MIN_HOURS_PER_DAY,
                max: MAX_HOURS_PER_DAY,
            })?;
        if scale != self.scale {
            self.scale = scale;
            self.store.set(KEY_HOURS, scale.hours_per_day().to_string());
        }
        Ok(())
    }

    pub fn set_mode(&mut self, mode: Mode) {
        if mode != self.mode {
            self.mode = mode;
            self.store.set(KEY_MODE, mode.as_str().to_string());
        }
    }

    /// Flips run/pause and returns whether the stopwatch is now running.
    pub fn toggle_stopwatch(&mut self) -> bool {
        self.stopwatch.running = !self.stopwatch.running;
        if !self.stopwatch.running {
            self.store
                .set(KEY_STOPWATCH_ELAPSED, self.stopwatch.persisted_value());
        }
        self.stopwatch.running
    }

    pub fn record_lap(&mut self) -> Result<String, CommandError> {
        if !self.stopwatch.running {
            return Err(CommandError::StopwatchPaused);
        }
        let lap = self.stopwatch_display();
        self.laps.record(lap.clone());
        self.store
            .set(KEY_STOPWATCH_LAPS, self.laps.persisted_value());
        Ok(lap)
    }

    pub fn reset_stopwatch(&mut self) -> Result<(), CommandError> {
        if self.stopwatch.running {
            return Err(CommandError::StopwatchRunning);
        }
        self.stopwatch = StopwatchState::default();
        self.laps.clear();
        self.store.set_many(vec![
            (KEY_STOPWATCH_ELAPSED, self.stopwatch.persisted_value()),
            (KEY_STOPWATCH_LAPS, self.laps.persisted_value()),
        ]);
        Ok(())
    }

    pub fn add_alarm(&mut self, hour: u32, minute: u32) -> Result<Alarm, CommandError> {
        if hour > 23 || minute > 59 {
            return Err(CommandError::InvalidAlarmTime(format!("{hour:02}:{minute:02}")));
        }
        let stamp = self
            .last_local
            .unwrap_or_else(|| Local::now().naive_local())
            .and_utc()
            .timestamp();
        let id = generate_alarm_id(&self.alarms, stamp, &mut self.next_alarm_id);
        let alarm = Alarm {
            id,
            hour,
            minute,
            enabled: true,
        };
        info!(id = %alarm.id, time = %alarm.label(), "alarm added");
        self.alarms.push(alarm.clone());
        self.persist_alarms();
        Ok(alarm)
    }

    /// Alarm form entry point: accepts `HH:MM` text.
    pub fn add_alarm_from_input(&mut self, input: &str) -> Result<Alarm, CommandError> {
        let (hour, minute) = parse_alarm_time(input)?;
        self.add_alarm(hour, minute)
    }

    /// Returns the new enabled flag.
    pub fn toggle_alarm(&mut self, id: &str) -> Result<bool, CommandError> {
        let alarm = self
            .alarms
            .iter_mut()
            .find(|alarm| alarm.id == id)
            .ok_or_else(|| CommandError::UnknownAlarm(id.to_string()))?;
        alarm.enabled = !alarm.enabled;
        let enabled = alarm.enabled;
        self.persist_alarms();
        Ok(enabled)
    }

    pub fn delete_alarm(&mut self, id: &str) -> Result<Alarm, CommandError> {
        let index = self
            .alarms
            .iter()
            .position(|alarm| alarm.id == id)
            .ok_or_else(|| CommandError::UnknownAlarm(id.to_string()))?;
        let removed = self.alarms.remove(index);
        self.matcher.forget(&removed.id);
        self.persist_alarms();
        Ok(removed)
    }

    /// Writes every persisted key at once.
    pub fn save_all(&mut self) {
        self.since_flush_ms = 0.0;
        self.store.set_many(vec![
            (KEY_HOURS, self.scale.hours_per_day().to_string()),
            (KEY_MODE, self.mode.as_str().to_string()),
            (KEY_STOPWATCH_ELAPSED, self.stopwatch.persisted_value()),
            (KEY_STOPWATCH_LAPS, self.laps.persisted_value()),
            (KEY_ALARMS, serialize_alarm_list(&self.alarms)),
        ]);
    }

    fn persist_alarms(&mut self) {
        self.store
            .set(KEY_ALARMS, serialize_alarm_list(&self.alarms));
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use chrono::NaiveDate;

    use super::*;
    use crate::store::MemoryStore;

    /// MemoryStore shared between the session under test and the assertions.
    #[derive(Clone, Default)]
    struct SharedStore(Rc<RefCell<MemoryStore>>);

    impl PersistentStore for SharedStore {
        fn get(&self, key: &str) -> Option<String> {
            self.0.borrow().get(key)
        }

        fn set(&mut self, key: &str, value: String) {
            self.0.borrow_mut().set(key, value);
        }

        fn clear(&mut self, key: &str) {
            self.0.borrow_mut().clear(key);
        }
    }

    fn at(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 16)
            .expect("date")
            .and_hms_opt(hour, minute, second)
            .expect("time")
    }

    fn sample(local: NaiveDateTime) -> TimeSample {
        TimeSample {
            local,
            monotonic_ms: 0.0,
        }
    }

    fn fresh() -> (Session, SharedStore) {
        let store = SharedStore::default();
        (Session::restore(Box::new(store.clone())), store)
    }

    #[test]
    fn empty_store_restores_defaults() {
        let (session, _) = fresh();
        assert_eq!(session.hours_per_day(), 24);
        assert_eq!(session.mode(), Mode::Clock);
        assert_eq!(session.stopwatch(), StopwatchState::default());
        assert!(session.laps().is_empty());
        assert!(session.alarms().is_empty());
    }

    #[test]
    fn malformed_store_restores_defaults() {
        let mut store = SharedStore::default();
        store.set(KEY_HOURS, "zero".to_string());
        store.set(KEY_MODE, "calendar".to_string());
        store.set(KEY_STOPWATCH_ELAPSED, "-12".to_string());
        store.set(KEY_STOPWATCH_LAPS, "[1,2".to_string());
        store.set(KEY_ALARMS, "{}".to_string());
        let session = Session::restore(Box::new(store));
        assert_eq!(session.hours_per_day(), 24);
        assert_eq!(session.mode(), Mode::Clock);
        assert_eq!(session.stopwatch().elapsed_ms, 0.0);
        assert!(session.laps().is_empty());
        assert!(session.alarms().is_empty());
    }

    #[test]
    fn state_survives_a_reload() {
        let (mut session, store) = fresh();
        session.set_hours_per_day(12).expect("hours");
        session.set_mode(Mode::Stopwatch);
        session.toggle_stopwatch();
        session.tick(&sample(at(9, 0, 0)), 30_000.0);
        session.record_lap().expect("lap");
        session.toggle_stopwatch();
        let alarm = session.add_alarm(7, 0).expect("alarm");
        drop(session);

        let restored = Session::restore(Box::new(store));
        assert_eq!(restored.hours_per_day(), 12);
        assert_eq!(restored.mode(), Mode::Stopwatch);
        assert_eq!(restored.stopwatch().elapsed_ms, 60_000.0);
        assert!(!restored.stopwatch().running);
        assert_eq!(restored.laps().numbered().next(), Some((1, "01:00")));
        assert_eq!(restored.alarms(), &[alarm]);
    }

    #[test]
    fn tick_renders_active_mode() {
        let (mut session, _) = fresh();
        let now = sample(at(6, 0, 0));
        assert_eq!(session.tick(&now, 16.0).display, "06:00:00");
        session.set_hours_per_day(12).expect("hours");
        assert_eq!(session.tick(&now, 16.0).display, "12:00:00");
        session.set_mode(Mode::Alarm);
        assert_eq!(session.tick(&now, 16.0).display, "06:00:00");
        session.set_mode(Mode::Stopwatch);
        assert_eq!(session.tick(&now, 16.0).display, "00:00");
    }

    #[test]
    fn stopwatch_scales_with_day_length() {
        let (mut session, _) = fresh();
        session.set_hours_per_day(6).expect("hours");
        assert!(session.toggle_stopwatch());
        session.tick(&sample(at(1, 0, 0)), 1_000.0);
        assert_eq!(session.stopwatch().elapsed_ms, 4_000.0);
    }

    #[test]
    fn alarms_fire_in_any_mode_once_per_minute() {
        let (mut session, _) = fresh();
        session.set_mode(Mode::Stopwatch);
        let alarm = session.add_alarm_from_input("08:30").expect("alarm");
        let mut fired = Vec::new();
        for second in 0..60 {
            fired.extend(session.tick(&sample(at(8, 30, second)), 1_000.0).fired);
        }
        assert_eq!(fired, vec![alarm]);
    }

    #[test]
    fn alarm_added_inside_its_minute_waits_for_the_next_day() {
        let (mut session, _) = fresh();
        session.tick(&sample(at(8, 30, 44)), 16.0);
        session.add_alarm(8, 30).expect("alarm");
        assert!(session.tick(&sample(at(8, 30, 45)), 1_000.0).fired.is_empty());
        assert!(session.tick(&sample(at(8, 30, 59)), 14_000.0).fired.is_empty());

        let tomorrow = at(8, 30, 0) + chrono::Duration::days(1);
        session.tick(&sample(tomorrow - chrono::Duration::seconds(1)), 16.0);
        assert_eq!(session.tick(&sample(tomorrow), 1_000.0).fired.len(), 1);
    }

    #[test]
    fn re_enabled_alarm_does_not_fire_late() {
        let (mut session, _) = fresh();
        let alarm = session.add_alarm(6, 0).expect("alarm");
        session.toggle_alarm(&alarm.id).expect("disable");
        session.tick(&sample(at(5, 59, 59)), 16.0);
        assert!(session.tick(&sample(at(6, 0, 0)), 1_000.0).fired.is_empty());
        session.toggle_alarm(&alarm.id).expect("enable");
        assert!(session.tick(&sample(at(6, 0, 1)), 1_000.0).fired.is_empty());
    }

    #[test]
    fn rejected_inputs_leave_state_alone() {
        let (mut session, store) = fresh();
        assert_eq!(
            session.add_alarm_from_input("  "),
            Err(CommandError::EmptyAlarmTime)
        );
        assert!(matches!(
            session.add_alarm_from_input("7h30"),
            Err(CommandError::InvalidAlarmTime(_))
        ));
        assert!(matches!(
            session.set_hours_per_day(0),
            Err(CommandError::HoursOutOfRange { value: 0, .. })
        ));
        assert!(matches!(
            session.set_hours_per_day(300),
            Err(CommandError::HoursOutOfRange { value: 300, .. })
        ));
        assert_eq!(session.record_lap(), Err(CommandError::StopwatchPaused));
        assert!(matches!(
            session.toggle_alarm("nope"),
            Err(CommandError::UnknownAlarm(_))
        ));
        assert!(session.alarms().is_empty());
        assert_eq!(session.hours_per_day(), 24);
        assert_eq!(store.get(KEY_ALARMS), None);
        assert_eq!(store.get(KEY_HOURS), None);
    }

    #[test]
    fn reset_requires_pause_and_clears_laps() {
        let (mut session, store) = fresh();
        session.toggle_stopwatch();
        session.tick(&sample(at(10, 0, 0)), 5_000.0);
        session.record_lap().expect("lap");
        assert_eq!(
            session.reset_stopwatch(),
            Err(CommandError::StopwatchRunning)
        );
        session.toggle_stopwatch();
        assert_eq!(store.get(KEY_STOPWATCH_ELAPSED).as_deref(), Some("5000"));
        session.reset_stopwatch().expect("reset");
        assert_eq!(session.stopwatch().elapsed_ms, 0.0);
        assert!(session.laps().is_empty());
        assert_eq!(store.get(KEY_STOPWATCH_LAPS).as_deref(), Some("[]"));
    }

    #[test]
    fn toggling_and_deleting_alarms_persist() {
        let (mut session, store) = fresh();
        let first = session.add_alarm(6, 15).expect("first");
        let second = session.add_alarm(6, 15).expect("second");
        assert_ne!(first.id, second.id);

        assert_eq!(session.toggle_alarm(&first.id), Ok(false));
        let persisted = parse_alarm_list(&store.get(KEY_ALARMS).expect("alarms"));
        assert!(!persisted[0].enabled);

        session.delete_alarm(&second.id).expect("delete");
        let persisted = parse_alarm_list(&store.get(KEY_ALARMS).expect("alarms"));
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].id, first.id);
    }

    #[test]
    fn periodic_flush_after_two_seconds_of_ticks() {
        let (mut session, store) = fresh();
        session.toggle_stopwatch();
        for _ in 0..124 {
            session.tick(&sample(at(12, 0, 0)), 16.0);
        }
        assert_eq!(store.get(KEY_STOPWATCH_ELAPSED), None);
        session.tick(&sample(at(12, 0, 2)), 16.0);
        assert_eq!(store.get(KEY_STOPWATCH_ELAPSED).as_deref(), Some("2000"));
        assert_eq!(store.get(KEY_MODE).as_deref(), Some("clock"));
        assert_eq!(store.get(KEY_ALARMS).as_deref(), Some("[]"));
    }

    #[test]
    fn mode_strings_round_trip() {
        for mode in Mode::ALL {
            assert_eq!(mode.as_str().parse::<Mode>(), Ok(mode));
        }
        assert!("Clock".parse::<Mode>().is_err());
    }
}
