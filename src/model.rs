use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fields::{first_flag, first_text, first_value, full_name, lookup};

/// Floating milliseconds: a wall clock read as if it were UTC.
pub type Ms = i64;

/// Half-open floating interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }
}

// ── Field chains ─────────────────────────────────────────────────

/// Ordered alias lists for every logical reservation field.
pub mod chain {
    pub const START: &[&str] = &["startTime", "start", "startDate", "date"];
    pub const END: &[&str] = &["endTime", "end", "endDate"];
    pub const ENTRY_KEY: &[&str] = &["entryKey"];
    pub const ID: &[&str] = &["id", "_id", "entryKey"];
    pub const INSTRUCTOR_ID: &[&str] = &["instructorId", "instructor_id", "instructor.id"];
    pub const USER_ID: &[&str] = &["userId", "studentId", "user_id", "user.id", "student.id"];
    pub const GROUP_ID: &[&str] = &["groupId", "group_id", "group.id"];
    pub const STUDENT_NAME: &[&str] = &["studentName", "userName"];
    pub const USER_OBJECT: &[&str] = &["user", "student"];
    pub const PHONE: &[&str] = &["studentPhone", "phone", "phoneNumber", "user.phone", "student.phone"];
    pub const GROUP_NAME: &[&str] = &["groupName", "group.name"];
    pub const INSTRUCTOR_NAME: &[&str] = &["instructorName", "instructor.name"];
    pub const SECTOR: &[&str] = &["sector"];
    pub const GEARBOX: &[&str] = &["gearbox"];
    pub const COLOR: &[&str] = &["color", "instructor.color"];
    pub const NOTES: &[&str] = &["privateMessage", "notes", "note"];
    pub const CONFIRMED: &[&str] = &["isConfirmed", "confirmed"];
    /// Phone fields on a student lookup record.
    pub const RECORD_PHONE: &[&str] = &["phone", "phoneNumber"];
}

/// A reservation record as the host application stores it. Never mutated here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationEntry(pub Value);

impl ReservationEntry {
    pub fn raw_start(&self) -> Option<&Value> {
        first_value(&self.0, chain::START)
    }

    pub fn raw_end(&self) -> Option<&Value> {
        first_value(&self.0, chain::END)
    }

    pub fn entry_key(&self) -> Option<String> {
        first_text(&self.0, chain::ENTRY_KEY)
    }

    pub fn id(&self) -> Option<String> {
        first_text(&self.0, chain::ID)
    }

    pub fn instructor_id(&self) -> Option<String> {
        first_text(&self.0, chain::INSTRUCTOR_ID)
    }

    pub fn user_id(&self) -> Option<String> {
        first_text(&self.0, chain::USER_ID)
    }

    pub fn group_id(&self) -> Option<String> {
        first_text(&self.0, chain::GROUP_ID)
    }

    /// Embedded `user`/`student` object, if the producer inlined one.
    pub fn user_object(&self) -> Option<&Value> {
        chain::USER_OBJECT
            .iter()
            .filter_map(|path| lookup(&self.0, path))
            .find(|v| v.is_object())
    }

    pub fn student_name(&self) -> Option<String> {
        first_text(&self.0, chain::STUDENT_NAME).or_else(|| self.user_object().and_then(full_name))
    }

    pub fn phone(&self) -> Option<String> {
        first_text(&self.0, chain::PHONE)
    }

    pub fn group_name(&self) -> Option<String> {
        first_text(&self.0, chain::GROUP_NAME)
    }

    pub fn instructor_name(&self) -> Option<String> {
        first_text(&self.0, chain::INSTRUCTOR_NAME)
            .or_else(|| lookup(&self.0, "instructor").and_then(full_name))
    }

    pub fn sector(&self) -> Option<String> {
        first_text(&self.0, chain::SECTOR)
    }

    pub fn gearbox(&self) -> Option<String> {
        first_text(&self.0, chain::GEARBOX)
    }

    pub fn color(&self) -> Option<String> {
        first_text(&self.0, chain::COLOR)
    }

    pub fn notes(&self) -> Option<String> {
        first_text(&self.0, chain::NOTES)
    }

    pub fn is_confirmed(&self) -> bool {
        first_flag(&self.0, chain::CONFIRMED).unwrap_or(false)
    }
}

// ── Day slot output ──────────────────────────────────────────────

/// Grid key of one instructor cell: `instructorId|slotIndex`.
pub fn cell_key(instructor_id: &str, slot_index: u32) -> String {
    format!("{instructor_id}|{slot_index}")
}

/// A visible reservation card anchored at its start cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotCard {
    pub key: String,
    pub reservation_id: Option<String>,
    pub instructor_id: String,
    pub slot_index: u32,
    pub span_slots: u32,
    pub title: String,
    pub subtitle: String,
    pub color: Option<String>,
}

// ── Month scene output ───────────────────────────────────────────

/// Display-ready view of one stored entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedEvent {
    pub id: String,
    pub entry_key: String,
    pub start_ms: Ms,
    pub end_ms: Ms,
    pub day_ts: Ms,
    /// `YYYY-MM-DD|HH:mm` in the scene's time zone.
    pub local_slot_key: String,
    pub instructor_id: Option<String>,
    pub instructor_name: Option<String>,
    pub student_id: Option<String>,
    pub student_name: Option<String>,
    pub student_phone: Option<String>,
    pub group_id: Option<String>,
    pub group_name: Option<String>,
    pub title: String,
    pub sector: Option<String>,
    pub gearbox: Option<String>,
    pub color: Option<String>,
    pub notes: Option<String>,
    pub is_confirmed: bool,
    pub search_norm: String,
    pub search_phone_digits: String,
}

/// One row of the free-text/phone search catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRecord {
    pub day_ts: Ms,
    pub event_id: String,
    pub search_norm: String,
    pub search_phone_digits: String,
}

/// Events of one floating day, in canonical order.
pub type DayBucket = (Ms, Vec<ProjectedEvent>);
