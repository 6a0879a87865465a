//! Request/response envelopes exchanged with the host.
//!
//! Requests are `{ type, requestId, payload }`; the `requestId` is echoed back
//! verbatim. Payload fields are lenient: anything missing, `null` or of the
//! wrong type takes its default, and numeric fields also accept numeric
//! strings. Only a payload that is not an object fails a request.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::day_slots::DaySlotIndex;
use crate::model::ReservationEntry;
use crate::scene::{MonthIndex, SceneError};

pub const TYPE_INDEX: &str = "index";
pub const TYPE_INDEX_MONTH: &str = "index-month";
pub const TYPE_INDEX_MONTH_RESET: &str = "index-month-reset";
pub const TYPE_INDEX_MONTH_PATCH: &str = "index-month-patch";

/// The two independent computation units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    DaySlots,
    MonthScene,
}

impl Unit {
    /// Unit responsible for a request type, if any.
    pub fn of(kind: &str) -> Option<Unit> {
        match kind {
            TYPE_INDEX => Some(Unit::DaySlots),
            TYPE_INDEX_MONTH | TYPE_INDEX_MONTH_RESET | TYPE_INDEX_MONTH_PATCH => {
                Some(Unit::MonthScene)
            }
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Unit::DaySlots => "day_slots",
            Unit::MonthScene => "month_scene",
        }
    }
}

/// Unit addressed by a raw envelope, or `None` for anything unroutable.
pub fn route(raw: &Value) -> Option<Unit> {
    raw.get("type").and_then(Value::as_str).and_then(Unit::of)
}

// ── Envelope ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub kind: String,
    pub request_id: Value,
    pub payload: Value,
}

impl Envelope {
    /// Split a raw message. `None` when it is not an object with a string `type`.
    pub fn parse(raw: Value) -> Option<Envelope> {
        let Value::Object(mut map) = raw else {
            return None;
        };
        let kind = match map.remove("type") {
            Some(Value::String(kind)) => kind,
            _ => return None,
        };
        Some(Envelope {
            kind,
            request_id: map.remove("requestId").unwrap_or(Value::Null),
            payload: map.remove("payload").unwrap_or(Value::Null),
        })
    }
}

// ── Payloads ─────────────────────────────────────────────────────

/// Keep a field only when it has the expected shape; `null` or a value of
/// another type reads as the default.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + DeserializeOwned,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(raw).unwrap_or_default())
}

/// A number, or a string holding one; anything else reads as absent.
fn loose_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DayIndexPayload {
    #[serde(deserialize_with = "lenient")]
    pub reservations: Vec<ReservationEntry>,
    #[serde(deserialize_with = "lenient")]
    pub selected_ymd: String,
    #[serde(deserialize_with = "loose_number")]
    pub day_start_ms: Option<f64>,
    #[serde(deserialize_with = "loose_number")]
    pub slot_count: Option<f64>,
    #[serde(deserialize_with = "loose_number")]
    pub step_min: Option<f64>,
    #[serde(deserialize_with = "loose_number")]
    pub lesson_min: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub instructor_ids: Vec<Value>,
    #[serde(deserialize_with = "lenient")]
    pub user_name_by_id: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonthResetPayload {
    #[serde(deserialize_with = "lenient")]
    pub month_key: String,
    #[serde(deserialize_with = "lenient")]
    pub time_zone: Option<String>,
    #[serde(deserialize_with = "loose_number")]
    pub lesson_minutes: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    pub students_by_id: HashMap<String, Value>,
    #[serde(deserialize_with = "lenient")]
    pub group_name_by_id: HashMap<String, Value>,
    #[serde(deserialize_with = "lenient")]
    pub instructor_meta_by_id: HashMap<String, Value>,
    #[serde(deserialize_with = "lenient")]
    pub reservations: Vec<ReservationEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonthPatchPayload {
    #[serde(deserialize_with = "lenient")]
    pub month_key: String,
    #[serde(deserialize_with = "lenient")]
    pub removals: Vec<Value>,
    #[serde(deserialize_with = "lenient")]
    pub upserts: Vec<ReservationEntry>,
}

/// A positive whole number from a loose payload value, else `fallback`.
pub fn positive_or(value: Option<f64>, fallback: u32) -> u32 {
    match value {
        Some(v) if v.is_finite() && v >= 1.0 => v.trunc().min(f64::from(u32::MAX)) as u32,
        _ => fallback,
    }
}

// ── Requests ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Request {
    DayIndex(DayIndexPayload),
    MonthReset(MonthResetPayload),
    MonthPatch(MonthPatchPayload),
}

impl Request {
    pub fn decode(kind: &str, payload: Value) -> Result<Request, RequestError> {
        let payload = if payload.is_null() {
            Value::Object(Default::default())
        } else {
            payload
        };
        let invalid = |e: serde_json::Error| RequestError::InvalidPayload {
            kind: kind.to_string(),
            reason: e.to_string(),
        };
        match kind {
            TYPE_INDEX => serde_json::from_value(payload).map(Request::DayIndex).map_err(invalid),
            TYPE_INDEX_MONTH | TYPE_INDEX_MONTH_RESET => serde_json::from_value(payload)
                .map(Request::MonthReset)
                .map_err(invalid),
            TYPE_INDEX_MONTH_PATCH => serde_json::from_value(payload)
                .map(Request::MonthPatch)
                .map_err(invalid),
            other => Err(RequestError::Unsupported(other.to_string())),
        }
    }
}

#[derive(Debug)]
pub enum RequestError {
    InvalidPayload { kind: String, reason: String },
    Unsupported(String),
    Scene(SceneError),
    Panicked(String),
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestError::InvalidPayload { kind, reason } => {
                write!(f, "invalid {kind} payload: {reason}")
            }
            RequestError::Unsupported(kind) => write!(f, "unsupported request type: {kind}"),
            RequestError::Scene(e) => write!(f, "{e}"),
            RequestError::Panicked(msg) => write!(f, "indexing failed: {msg}"),
        }
    }
}

impl std::error::Error for RequestError {}

impl From<SceneError> for RequestError {
    fn from(e: SceneError) -> Self {
        RequestError::Scene(e)
    }
}

// ── Responses ────────────────────────────────────────────────────

/// Successful computation result of either unit.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Day(DaySlotIndex),
    Month(MonthIndex),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Response {
    #[serde(rename_all = "camelCase")]
    IndexResult {
        request_id: Value,
        #[serde(flatten)]
        index: DaySlotIndex,
    },
    #[serde(rename_all = "camelCase")]
    IndexError { request_id: Value, error: String },
    #[serde(rename_all = "camelCase")]
    MonthIndexResult {
        request_id: Value,
        #[serde(flatten)]
        index: MonthIndex,
    },
    #[serde(rename_all = "camelCase")]
    MonthIndexError { request_id: Value, error: String },
}

impl Response {
    pub fn success(request_id: Value, reply: Reply) -> Response {
        match reply {
            Reply::Day(index) => Response::IndexResult { request_id, index },
            Reply::Month(index) => Response::MonthIndexResult { request_id, index },
        }
    }

    pub fn failure(unit: Unit, request_id: Value, error: String) -> Response {
        match unit {
            Unit::DaySlots => Response::IndexError { request_id, error },
            Unit::MonthScene => Response::MonthIndexError { request_id, error },
        }
    }

    pub fn request_id(&self) -> &Value {
        match self {
            Response::IndexResult { request_id, .. }
            | Response::IndexError { request_id, .. }
            | Response::MonthIndexResult { request_id, .. }
            | Response::MonthIndexError { request_id, .. } => request_id,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::IndexError { .. } | Response::MonthIndexError { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Response::IndexError { error, .. } | Response::MonthIndexError { error, .. } => {
                Some(error)
            }
            _ => None,
        }
    }
}
