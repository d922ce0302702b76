use std::collections::HashSet;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::CommandError;

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: String,
    pub hour: u32,
    #[serde(rename = "min")]
    pub minute: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Alarm {
    pub fn label(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }

    fn in_range(&self) -> bool {
        self.hour < 24 && self.minute < 60
    }
}

/// Decodes the persisted alarm list. Malformed JSON yields an empty list;
/// individual entries that are malformed, out of range, or reuse an earlier id
/// are dropped.
pub fn parse_alarm_list(content: &str) -> Vec<Alarm> {
    let raw = match serde_json::from_str::<Vec<Value>>(content) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(
                "discarding malformed alarm list (line {}, column {}): {err}",
                err.line(),
                err.column()
            );
            return Vec::new();
        }
    };

    let mut ids = HashSet::new();
    let mut alarms = Vec::with_capacity(raw.len());
    for entry in raw {
        let alarm = match serde_json::from_value::<Alarm>(entry) {
            Ok(alarm) => alarm,
            Err(err) => {
                warn!("dropping unreadable alarm entry: {err}");
                continue;
            }
        };
        if !alarm.in_range() {
            warn!(id = %alarm.id, hour = alarm.hour, minute = alarm.minute, "dropping out-of-range alarm");
            continue;
        }
        if !ids.insert(alarm.id.clone()) {
            warn!(id = %alarm.id, "dropping duplicate alarm id");
            continue;
        }
        alarms.push(alarm);
    }
    alarms
}

pub fn serialize_alarm_list(alarms: &[Alarm]) -> String {
    serde_json::to_string(alarms).unwrap_or_else(|_| "[]".to_string())
}

/// Parses the alarm form value: `HH:MM`, optionally with seconds, which are ignored.
pub fn parse_alarm_time(input: &str) -> Result<(u32, u32), CommandError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CommandError::EmptyAlarmTime);
    }
    let time = NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| CommandError::InvalidAlarmTime(trimmed.to_string()))?;
    Ok((time.hour(), time.minute()))
}

/// Produces an id not present in `alarms`, shaped `alarm-<stamp>-<counter>`.
pub fn generate_alarm_id(alarms: &[Alarm], stamp: i64, counter: &mut u64) -> String {
    loop {
        let candidate = format!("alarm-{stamp}-{counter}");
        *counter += 1;
        if alarms.iter().all(|alarm| alarm.id != candidate) {
            return candidate;
        }
    }
}

fn default_enabled() -> bool {
    true
}
