use std::collections::VecDeque;

use tracing::warn;

use crate::engine::scale::speed_factor;

pub const MAX_LAPS: usize = 2_000;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StopwatchState {
    pub elapsed_ms: f64,
    pub running: bool,
}

impl StopwatchState {
    /// Rehydrated stopwatches always come back paused.
    pub fn from_persisted(raw: Option<&str>) -> Self {
        let elapsed_ms = raw
            .and_then(|text| text.trim().parse::<f64>().ok())
            .filter(|value| value.is_finite() && *value >= 0.0)
            .unwrap_or(0.0);
        Self {
            elapsed_ms,
            running: false,
        }
    }

    pub fn persisted_value(&self) -> String {
        format!("{}", self.elapsed_ms.round() as u64)
    }
}

/// Accumulates scaled real time while running. A zero delta is a no-op;
/// non-finite or negative deltas are replaced upstream by
/// [`crate::scheduler::clamp_frame_delta`] and ignored here.
pub fn advance_stopwatch(state: StopwatchState, dt_ms: f64, hours_per_day: u8) -> StopwatchState {
    if !state.running || !dt_ms.is_finite() || dt_ms <= 0.0 {
        return state;
    }
    StopwatchState {
        elapsed_ms: state.elapsed_ms + dt_ms * speed_factor(hours_per_day),
        running: true,
    }
}

/// `mm:ss` below an hour, `hh:mm:ss` from then on. Hours are not wrapped.
pub fn format_stopwatch(elapsed_ms: f64) -> String {
    let total_secs = if elapsed_ms.is_finite() && elapsed_ms > 0.0 {
        (elapsed_ms / 1_000.0).floor() as u64
    } else {
        0
    };
    let hours = total_secs / 3_600;
    let minutes = (total_secs / 60) % 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

/// Newest-first lap snapshots, bounded at [`MAX_LAPS`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LapHistory {
    laps: VecDeque<String>,
}

impl LapHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_persisted(raw: Option<&str>) -> Self {
        let Some(text) = raw else {
            return Self::new();
        };
        match serde_json::from_str::<Vec<String>>(text) {
            Ok(mut laps) => {
                laps.truncate(MAX_LAPS);
                Self { laps: laps.into() }
            }
            Err(err) => {
                warn!("discarding malformed lap history: {err}");
                Self::new()
            }
        }
    }

    pub fn persisted_value(&self) -> String {
        serde_json::to_string(&self.laps).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn record(&mut self, display: String) {
        self.laps.push_front(display);
        while self.laps.len() > MAX_LAPS {
            let _ = self.laps.pop_back();
        }
    }

    pub fn clear(&mut self) {
        self.laps.clear();
    }

    pub fn len(&self) -> usize {
        self.laps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.laps.is_empty()
    }

    /// Newest first, paired with the 1-based lap number.
    pub fn numbered(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        let total = self.laps.len();
        self.laps
            .iter()
            .enumerate()
            .map(move |(index, lap)| (total - index, lap.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(elapsed_ms: f64) -> StopwatchState {
        StopwatchState {
            elapsed_ms,
            running: true,
        }
    }

    #[test]
    fn zero_delta_is_noop() {
        let state = running(1_234.0);
        assert_eq!(advance_stopwatch(state, 0.0, 24), state);
    }

    #[test]
    fn paused_stopwatch_never_moves() {
        let mut state = StopwatchState {
            elapsed_ms: 500.0,
            running: false,
        };
        for _ in 0..1_000 {
            state = advance_stopwatch(state, 16.7, 6);
        }
        assert_eq!(state.elapsed_ms, 500.0);
    }

    #[test]
    fn delta_is_scaled_by_day_length() {
        let state = advance_stopwatch(running(0.0), 1_000.0, 12);
        assert_eq!(state.elapsed_ms, 2_000.0);
        let state = advance_stopwatch(running(0.0), 1_000.0, 48);
        assert_eq!(state.elapsed_ms, 500.0);
    }

    #[test]
    fn an_hour_of_frames_adds_up_to_an_hour() {
        let mut state = running(0.0);
        let frame_ms = 1_000.0 / 60.0;
        for _ in 0..(3_600 * 60) {
            state = advance_stopwatch(state, frame_ms, 24);
        }
        assert!((state.elapsed_ms - 3_600_000.0).abs() < 1.0);
    }

    #[test]
    fn format_switches_to_hours() {
        assert_eq!(format_stopwatch(0.0), "00:00");
        assert_eq!(format_stopwatch(65_000.0), "01:05");
        assert_eq!(format_stopwatch(59_999.0), "00:59");
        assert_eq!(format_stopwatch(3_661_000.0), "01:01:01");
        assert_eq!(format_stopwatch(100.0 * 3_600_000.0), "100:00:00");
    }

    #[test]
    fn lap_cap_evicts_oldest() {
        let mut laps = LapHistory::new();
        for index in 0..=MAX_LAPS {
            laps.record(format!("lap-{index}"));
        }
        assert_eq!(laps.len(), MAX_LAPS);
        let (newest_number, newest) = laps.numbered().next().expect("newest");
        assert_eq!(newest, format!("lap-{MAX_LAPS}"));
        assert_eq!(newest_number, MAX_LAPS);
        let (_, oldest) = laps.numbered().last().expect("oldest");
        assert_eq!(oldest, "lap-1");
    }

    #[test]
    fn persisted_values_are_lenient() {
        assert_eq!(StopwatchState::from_persisted(Some("65000")).elapsed_ms, 65_000.0);
        assert_eq!(StopwatchState::from_persisted(Some("-3")).elapsed_ms, 0.0);
        assert_eq!(StopwatchState::from_persisted(Some("NaN")).elapsed_ms, 0.0);
        assert!(!StopwatchState::from_persisted(Some("10")).running);
        assert!(LapHistory::from_persisted(Some("{oops")).is_empty());

        let laps = LapHistory::from_persisted(Some(r#"["00:02","00:01"]"#));
        assert_eq!(laps.persisted_value(), r#"["00:02","00:01"]"#);
    }
}
