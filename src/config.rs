use crate::day_slots::DayGrid;

pub const DEFAULT_TIME_ZONE: &str = "Europe/Bucharest";
pub const DEFAULT_LESSON_MINUTES: u32 = 90;
pub const DEFAULT_SLOT_COUNT: u32 = 28;
pub const DEFAULT_STEP_MINUTES: u32 = 30;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Process-wide defaults. Request payloads override the grid and zone values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub time_zone: String,
    pub lesson_minutes: u32,
    pub slot_count: u32,
    pub step_minutes: u32,
    pub channel_capacity: usize,
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            time_zone: DEFAULT_TIME_ZONE.to_string(),
            lesson_minutes: DEFAULT_LESSON_MINUTES,
            slot_count: DEFAULT_SLOT_COUNT,
            step_minutes: DEFAULT_STEP_MINUTES,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            metrics_port: None,
        }
    }
}

impl Config {
    /// Read `CALINDEX_*` environment variables, keeping defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let positive = |key: &str, fallback: u32| -> u32 {
            lookup(key)
                .and_then(|s| s.trim().parse::<u32>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(fallback)
        };
        Self {
            time_zone: lookup("CALINDEX_TIME_ZONE")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.time_zone),
            lesson_minutes: positive("CALINDEX_LESSON_MINUTES", defaults.lesson_minutes),
            slot_count: positive("CALINDEX_SLOT_COUNT", defaults.slot_count),
            step_minutes: positive("CALINDEX_STEP_MINUTES", defaults.step_minutes),
            channel_capacity: lookup("CALINDEX_CHANNEL_CAPACITY")
                .and_then(|s| s.trim().parse().ok())
                .filter(|v: &usize| *v > 0)
                .unwrap_or(defaults.channel_capacity),
            metrics_port: lookup("CALINDEX_METRICS_PORT").and_then(|s| s.trim().parse().ok()),
        }
    }

    pub fn day_grid(&self) -> DayGrid {
        DayGrid {
            slot_count: self.slot_count,
            step_min: self.step_minutes,
            lesson_min: self.lesson_minutes,
        }
    }
}
