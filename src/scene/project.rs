use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::fields::{first_text, full_name, scalar_text};
use crate::model::*;
use crate::temporal;

use super::SceneState;

const FALLBACK_TITLE: &str = "Programare";
const GROUP_PREFIX: &str = "Grupa";

/// Resolve one stored entry into its display-ready form.
///
/// Every field follows the same precedence: the entry's own field, then the
/// matching lookup record (student, group, instructor), then a literal.
/// Entries without a positive floating start, or whose span end does not
/// fit, produce nothing.
pub(super) fn project(entry_key: &str, entry: &ReservationEntry, scene: &SceneState) -> Option<ProjectedEvent> {
    let raw_start = entry.raw_start()?;
    let start = temporal::parse_floating(raw_start).filter(|ms| *ms > 0)?;
    let span = temporal::resolve_span(start, entry.raw_end(), scene.lesson_minutes)?;

    let instructor_id = entry.instructor_id();
    let meta = instructor_id
        .as_ref()
        .and_then(|id| scene.lookups.instructor_meta_by_id.get(id));
    let student_id = entry.user_id();
    let student = student_id
        .as_ref()
        .and_then(|id| scene.lookups.students_by_id.get(id));
    let group_id = entry.group_id();

    let student_name = entry.student_name().or_else(|| student.and_then(full_name));
    let student_phone = entry
        .phone()
        .or_else(|| student.and_then(|s| first_text(s, chain::RECORD_PHONE)));
    let group_name = entry
        .group_name()
        .or_else(|| {
            group_id
                .as_ref()
                .and_then(|id| scene.lookups.group_name_by_id.get(id))
                .and_then(|v| scalar_text(v).or_else(|| full_name(v)))
        })
        .or_else(|| group_id.as_ref().map(|id| format!("{GROUP_PREFIX} {id}")));
    let instructor_name = entry.instructor_name().or_else(|| meta.and_then(full_name));
    let sector = entry
        .sector()
        .or_else(|| meta.and_then(|m| first_text(m, chain::SECTOR)));
    let gearbox = gearbox_label(
        entry
            .gearbox()
            .or_else(|| meta.and_then(|m| first_text(m, chain::GEARBOX))),
    );
    let color = entry
        .color()
        .or_else(|| meta.and_then(|m| first_text(m, &["color"])));
    let notes = entry.notes();

    let title = student_name
        .clone()
        .or_else(|| group_name.clone())
        .unwrap_or_else(|| FALLBACK_TITLE.to_string());
    let local_slot_key = temporal::instant_of(raw_start, scene.time_zone)
        .and_then(|instant| temporal::zoned_parts(instant, scene.time_zone))
        .map(|parts| parts.slot_key())
        .unwrap_or_default();
    let search_norm = normalize_search(&[
        student_name.as_deref(),
        group_name.as_deref(),
        instructor_name.as_deref(),
        notes.as_deref(),
    ]);
    let search_phone_digits = phone_digits(student_phone.as_deref());

    Some(ProjectedEvent {
        id: entry.id().unwrap_or_else(|| entry_key.to_string()),
        entry_key: entry_key.to_string(),
        start_ms: span.start,
        end_ms: span.end,
        day_ts: temporal::day_start(span.start),
        local_slot_key,
        instructor_id,
        instructor_name,
        student_id,
        student_name,
        student_phone,
        group_id,
        group_name,
        title,
        sector,
        gearbox,
        color,
        notes,
        is_confirmed: entry.is_confirmed(),
        search_norm,
        search_phone_digits,
    })
}

/// `"A"` for automatic, `"M"` for manual, otherwise the raw label.
pub fn gearbox_label(raw: Option<String>) -> Option<String> {
    let raw = raw?;
    let lower = raw.to_lowercase();
    if lower.contains("auto") {
        Some("A".to_string())
    } else if lower.contains("man") {
        Some("M".to_string())
    } else {
        Some(raw)
    }
}

/// Lower-cased, diacritic-free text with single spaces.
pub fn normalize_search(parts: &[Option<&str>]) -> String {
    let joined = parts.iter().flatten().copied().collect::<Vec<_>>().join(" ");
    let stripped: String = joined.nfd().filter(|c| !is_combining_mark(*c)).collect();
    stripped
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn phone_digits(phone: Option<&str>) -> String {
    phone
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_digit)
        .collect()
}
