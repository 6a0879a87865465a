//! Floating wall-clock parsing and zone-aware formatting.
//!
//! Floating values never consult the process time zone: a wall clock is
//! encoded as its millisecond count read as UTC. Only [`zoned_parts`] and
//! [`instant_of`] deal with real instants, always against an explicit zone.

use chrono::{DateTime, Datelike, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde_json::Value;
use tracing::warn;

use crate::model::{Ms, Span};

pub const MINUTE_MS: Ms = 60_000;
pub const DAY_MS: Ms = 86_400_000;

/// Outermost representable date value, ±100,000,000 days around the epoch.
pub const MAX_FLOATING_MS: Ms = 8_640_000_000_000_000;

/// Fallback layouts tried after the primary `YYYY-MM-DD[ T]HH:mm[:ss]` prefix.
const FALLBACK_DATETIME_FORMATS: &[&str] = &["%Y/%m/%d %H:%M", "%d.%m.%Y %H:%M"];
const FALLBACK_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y"];

/// Parse a JSON date value into floating milliseconds.
///
/// Numbers are taken as floating milliseconds already. Strings starting with
/// `YYYY-MM-DD[ T]HH:mm[:ss]` use that wall clock and ignore whatever follows
/// (fractions, `Z`, offsets). Anything else goes through the fallback layouts.
/// Values beyond [`MAX_FLOATING_MS`] either way, or outside what chrono can
/// represent, are invalid.
pub fn parse_floating(value: &Value) -> Option<Ms> {
    let ms = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as Ms)),
        Value::String(s) => parse_floating_str(s),
        _ => None,
    }?;
    ((-MAX_FLOATING_MS..=MAX_FLOATING_MS).contains(&ms) && to_naive(ms).is_some()).then_some(ms)
}

pub fn parse_floating_str(raw: &str) -> Option<Ms> {
    let s = raw.trim();
    wall_clock_prefix(s)
        .or_else(|| fallback_parse(s))
        .map(floating_ms)
}

fn wall_clock_prefix(s: &str) -> Option<NaiveDateTime> {
    let b = s.as_bytes();
    if b.len() < 16 || b[4] != b'-' || b[7] != b'-' || b[13] != b':' {
        return None;
    }
    if b[10] != b'T' && b[10] != b' ' {
        return None;
    }
    let number = |from: usize, to: usize| -> Option<u32> {
        let part = s.get(from..to)?;
        if part.bytes().all(|c| c.is_ascii_digit()) {
            part.parse().ok()
        } else {
            None
        }
    };
    let year = number(0, 4)? as i32;
    let (month, day) = (number(5, 7)?, number(8, 10)?);
    let (hour, minute) = (number(11, 13)?, number(14, 16)?);
    let second = if b.get(16) == Some(&b':') {
        number(17, 19).unwrap_or(0)
    } else {
        0
    };
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}

fn fallback_parse(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.naive_local());
    }
    if let Some(dt) = FALLBACK_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Some(dt);
    }
    FALLBACK_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

pub fn floating_ms(naive: NaiveDateTime) -> Ms {
    naive.and_utc().timestamp_millis()
}

pub fn to_naive(floating: Ms) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(floating).map(|dt| dt.naive_utc())
}

/// Midnight of the floating day containing `floating`.
pub fn day_start(floating: Ms) -> Ms {
    floating - floating.rem_euclid(DAY_MS)
}

/// Floating midnight of a `YYYY-MM-DD` string.
pub fn parse_ymd(ymd: &str) -> Option<Ms> {
    NaiveDate::parse_from_str(ymd.trim(), "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(floating_ms)
}

pub fn ymd_of(floating: Ms) -> Option<String> {
    to_naive(floating).map(|dt| dt.format("%Y-%m-%d").to_string())
}

pub fn hm_of(floating: Ms) -> Option<String> {
    to_naive(floating).map(|dt| dt.format("%H:%M").to_string())
}

/// Interval of a reservation: the raw end when it parses and follows the
/// start, otherwise `start + fallback_minutes`. `None` when that end would
/// not fit in `Ms`.
pub fn resolve_span(start: Ms, raw_end: Option<&Value>, fallback_minutes: u32) -> Option<Span> {
    match raw_end.and_then(parse_floating) {
        Some(end) if end > start => Some(Span::new(start, end)),
        _ => Ms::from(fallback_minutes.max(1))
            .checked_mul(MINUTE_MS)
            .and_then(|len| start.checked_add(len))
            .map(|end| Span::new(start, end)),
    }
}

// ── Zone-aware parts ─────────────────────────────────────────────

/// Calendar and clock fields of an instant as seen in some zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZonedParts {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl ZonedParts {
    pub fn ymd(&self) -> String {
        format!("{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }

    pub fn hm(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }

    /// `YYYY-MM-DD|HH:mm`
    pub fn slot_key(&self) -> String {
        format!("{}|{}", self.ymd(), self.hm())
    }
}

/// Split a UTC instant (epoch ms) into wall-clock parts in `tz`.
pub fn zoned_parts(instant: Ms, tz: Tz) -> Option<ZonedParts> {
    let local = DateTime::<Utc>::from_timestamp_millis(instant)?.with_timezone(&tz);
    Some(ZonedParts {
        year: local.year(),
        month: local.month(),
        day: local.day(),
        hour: local.hour(),
        minute: local.minute(),
        second: local.second(),
    })
}

/// The real instant behind a raw start value.
///
/// RFC 3339 strings carry their own offset. Everything else is a wall clock
/// read in `tz`: the earlier instant on a DST fold, one hour later inside a gap.
pub fn instant_of(raw: &Value, tz: Tz) -> Option<Ms> {
    if let Value::String(s) = raw
        && let Ok(dt) = DateTime::parse_from_rfc3339(s.trim())
    {
        return Some(dt.timestamp_millis());
    }
    let naive = to_naive(parse_floating(raw)?)?;
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.timestamp_millis()),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.timestamp_millis()),
        LocalResult::None => naive
            .checked_add_signed(chrono::Duration::hours(1))
            .and_then(|shifted| tz.from_local_datetime(&shifted).earliest())
            .map(|dt| dt.timestamp_millis()),
    }
}

/// Resolves IANA zone ids, keeping the configured default parsed once.
#[derive(Debug, Clone)]
pub struct ZoneCache {
    default_id: String,
    default_tz: Tz,
}

impl ZoneCache {
    pub fn new(default_id: &str) -> Self {
        let default_tz = default_id.trim().parse::<Tz>().unwrap_or_else(|_| {
            warn!("unknown default time zone {default_id:?}, using UTC");
            Tz::UTC
        });
        Self {
            default_id: default_id.trim().to_string(),
            default_tz,
        }
    }

    pub fn default_zone(&self) -> Tz {
        self.default_tz
    }

    /// Zone for `id`; empty or unknown ids resolve to the default zone.
    pub fn resolve(&self, id: Option<&str>) -> Tz {
        match id.map(str::trim) {
            None | Some("") => self.default_tz,
            Some(id) if id == self.default_id => self.default_tz,
            Some(id) => id.parse::<Tz>().unwrap_or_else(|_| {
                warn!("unknown time zone {id:?}, falling back to {}", self.default_id);
                self.default_tz
            }),
        }
    }
}
