use std::fmt;

use chrono::{NaiveTime, Timelike};

pub const MIN_HOURS_PER_DAY: u8 = 1;
pub const MAX_HOURS_PER_DAY: u8 = 48;
pub const DEFAULT_HOURS_PER_DAY: u8 = 24;

/// How many virtual hours one real day is squeezed into.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ScaleConfig {
    hours_per_day: u8,
}

impl ScaleConfig {
    pub fn new(hours_per_day: u8) -> Option<Self> {
        (MIN_HOURS_PER_DAY..=MAX_HOURS_PER_DAY)
            .contains(&hours_per_day)
            .then_some(Self { hours_per_day })
    }

    pub fn hours_per_day(self) -> u8 {
        self.hours_per_day
    }

    /// Lenient parse for persisted values; anything unusable falls back to 24.
    pub fn from_persisted(raw: Option<&str>) -> Self {
        raw.and_then(|text| text.trim().parse::<u8>().ok())
            .and_then(Self::new)
            .unwrap_or_default()
    }
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            hours_per_day: DEFAULT_HOURS_PER_DAY,
        }
    }
}

/// `24 / hours_per_day`. Zero is treated as the default day length.
pub fn speed_factor(hours_per_day: u8) -> f64 {
    let hours = if hours_per_day == 0 {
        DEFAULT_HOURS_PER_DAY
    } else {
        hours_per_day
    };
    24.0 / f64::from(hours)
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct VirtualTime {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl fmt::Display for VirtualTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

/// Real seconds since local midnight, including the fractional part.
pub fn seconds_of_day(time: NaiveTime) -> f64 {
    // chrono encodes a leap second as nanos >= 1e9; pin it to the end of the second.
    let nanos = time.nanosecond().min(999_999_999);
    f64::from(time.num_seconds_from_midnight()) + f64::from(nanos) / 1_000_000_000.0
}

/// Maps a real time of day onto the virtual dial. Recomputed from the wall
/// clock on every call so no error is carried between frames.
pub fn compute_virtual_clock(real_seconds_of_day: f64, hours_per_day: u8) -> VirtualTime {
    let real = if real_seconds_of_day.is_finite() {
        real_seconds_of_day.max(0.0)
    } else {
        0.0
    };
    let total = (real * speed_factor(hours_per_day)).floor() as u64;
    VirtualTime {
        hour: ((total / 3_600) % 24) as u32,
        minute: ((total / 60) % 60) as u32,
        second: (total % 60) as u32,
    }
}
