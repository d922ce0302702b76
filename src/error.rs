use thiserror::Error;

/// Rejected user input. The session is left untouched whenever one of these
/// is returned.
#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum CommandError {
    #[error("please choose an alarm time")]
    EmptyAlarmTime,
    #[error("invalid alarm time '{0}', expected HH:MM")]
    InvalidAlarmTime(String),
    #[error("hours per day must be between {min} and {max}, got {value}")]
    HoursOutOfRange { value: u32, min: u8, max: u8 },
    #[error("no alarm with id '{0}'")]
    UnknownAlarm(String),
    #[error("laps can only be recorded while the stopwatch is running")]
    StopwatchPaused,
    #[error("stop the stopwatch before resetting it")]
    StopwatchRunning,
}
