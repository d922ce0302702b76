use std::collections::HashMap;

use chrono::{NaiveDateTime, Timelike};

use crate::alarm::model::Alarm;

/// Whether `alarm` is due at wall-clock `now`, given the previous tick at
/// `previous`. The alarm's `hh:mm:00` instant must fall in `(previous, now]`
/// and `now` must still be inside that minute. Without a previous tick only
/// the zero second itself qualifies.
pub fn is_due(alarm: &Alarm, previous: Option<&NaiveDateTime>, now: &NaiveDateTime) -> bool {
    if !alarm.enabled || alarm.hour != now.hour() || alarm.minute != now.minute() {
        return false;
    }
    match (previous, minute_key(now)) {
        (Some(previous), Some(trigger)) => *previous < trigger,
        (None, _) => now.second() == 0,
        (Some(_), None) => false,
    }
}

/// Local wall-clock minute (date included) that an alarm last fired in.
fn minute_key(now: &NaiveDateTime) -> Option<NaiveDateTime> {
    now.with_second(0)?.with_nanosecond(0)
}

/// Fires each alarm at most once per local minute, even when the zero-second
/// instant is never sampled or the wall clock revisits the same minute.
#[derive(Debug, Default)]
pub struct AlarmMatcher {
    last_fired: HashMap<String, NaiveDateTime>,
}

impl AlarmMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matches(
        &mut self,
        alarms: &[Alarm],
        previous: Option<NaiveDateTime>,
        now: NaiveDateTime,
    ) -> Vec<Alarm> {
        let Some(minute) = minute_key(&now) else {
            return Vec::new();
        };
        let mut fired = Vec::new();
        for alarm in alarms {
            if !is_due(alarm, previous.as_ref(), &now) {
                continue;
            }
            if self.last_fired.get(&alarm.id) == Some(&minute) {
                continue;
            }
            self.last_fired.insert(alarm.id.clone(), minute);
            fired.push(alarm.clone());
        }
        fired
    }

    pub fn forget(&mut self, id: &str) {
        self.last_fired.remove(id);
    }
}
