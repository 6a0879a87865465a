use std::collections::HashSet;
use std::time::Instant;

use serde::Serialize;

use crate::fields::{full_name, scalar_text};
use crate::model::*;
use crate::observability::build_ms;
use crate::protocol::{positive_or, DayIndexPayload, Reply, Request, RequestError, Unit};
use crate::temporal::{self, MINUTE_MS};
use crate::worker::Indexer;

const FALLBACK_TITLE: &str = "Elev";

/// Grid defaults used when a request leaves them out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayGrid {
    pub slot_count: u32,
    pub step_min: u32,
    pub lesson_min: u32,
}

impl Default for DayGrid {
    fn default() -> Self {
        Self {
            slot_count: crate::config::DEFAULT_SLOT_COUNT,
            step_min: crate::config::DEFAULT_STEP_MINUTES,
            lesson_min: crate::config::DEFAULT_LESSON_MINUTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySlotIndex {
    pub starts: Vec<SlotCard>,
    pub covered: Vec<String>,
    pub events_count: usize,
    pub build_ms: f64,
}

/// Grid claims made so far. A cell is either a start or covered, never both.
#[derive(Default)]
struct Occupancy {
    starts: HashSet<String>,
    covered: HashSet<String>,
}

impl Occupancy {
    fn is_claimed(&self, key: &str) -> bool {
        self.starts.contains(key) || self.covered.contains(key)
    }
}

/// Project one day's reservations onto the per-instructor slot grid.
///
/// Reservations are placed in input order and the first claim on a cell wins:
/// a reservation whose start cell is already a start or covered by an earlier
/// card is dropped entirely. A card's span never covers another card's start.
pub fn index_day(payload: &DayIndexPayload, grid: &DayGrid) -> DaySlotIndex {
    let started = Instant::now();
    let slot_count = positive_or(payload.slot_count, grid.slot_count);
    let step_min = positive_or(payload.step_min, grid.step_min);
    let lesson_min = positive_or(payload.lesson_min, grid.lesson_min);
    let step_ms = Ms::from(step_min) * MINUTE_MS;

    let day_start = payload
        .day_start_ms
        .filter(|v| v.is_finite())
        .map(|v| v.trunc() as Ms)
        .or_else(|| temporal::parse_ymd(&payload.selected_ymd))
        .unwrap_or(0);
    let selected_ymd = payload.selected_ymd.trim();
    let allowed: HashSet<String> = payload.instructor_ids.iter().filter_map(scalar_text).collect();

    let mut occupancy = Occupancy::default();
    let mut starts = Vec::new();
    let mut covered = Vec::new();

    for entry in &payload.reservations {
        let Some(start) = entry.raw_start().and_then(temporal::parse_floating) else {
            continue;
        };
        if temporal::ymd_of(start).as_deref() != Some(selected_ymd) {
            continue;
        }
        let Some(instructor_id) = entry.instructor_id() else {
            continue;
        };
        if !allowed.contains(&instructor_id) {
            continue;
        }

        let offset = start.saturating_sub(day_start);
        if offset < 0 || offset / step_ms >= Ms::from(slot_count) {
            continue;
        }
        let slot_index = (offset / step_ms) as u32;

        let Some(span) = temporal::resolve_span(start, entry.raw_end(), lesson_min) else {
            continue;
        };
        let duration_min = (span.duration_ms() / MINUTE_MS).max(Ms::from(step_min));
        let wanted = (duration_min + Ms::from(step_min) - 1) / Ms::from(step_min);
        let span_slots = wanted.clamp(1, Ms::from(slot_count - slot_index)) as u32;

        let key = cell_key(&instructor_id, slot_index);
        if occupancy.is_claimed(&key) {
            continue;
        }

        let title = entry
            .user_id()
            .and_then(|uid| payload.user_name_by_id.get(&uid))
            .and_then(scalar_text)
            .or_else(|| entry.user_object().and_then(full_name))
            .unwrap_or_else(|| FALLBACK_TITLE.to_string());

        occupancy.starts.insert(key.clone());
        starts.push(SlotCard {
            key,
            reservation_id: entry.id(),
            instructor_id: instructor_id.clone(),
            slot_index,
            span_slots,
            title,
            subtitle: subtitle(span, entry.sector().as_deref()),
            color: entry.color(),
        });

        for cell in slot_index + 1..slot_index + span_slots {
            let covered_key = cell_key(&instructor_id, cell);
            if occupancy.is_claimed(&covered_key) {
                continue;
            }
            occupancy.covered.insert(covered_key.clone());
            covered.push(covered_key);
        }
    }

    DaySlotIndex {
        events_count: starts.len(),
        starts,
        covered,
        build_ms: build_ms(started),
    }
}

/// `HH:mm - HH:mm • sector`; the sector part is left out when unknown.
fn subtitle(span: Span, sector: Option<&str>) -> String {
    let from = temporal::hm_of(span.start).unwrap_or_default();
    let to = temporal::hm_of(span.end).unwrap_or_default();
    match sector {
        Some(sector) => format!("{from} - {to} • {sector}"),
        None => format!("{from} - {to}"),
    }
}

/// Stateless unit serving `index` requests.
#[derive(Debug, Clone, Default)]
pub struct DaySlotIndexer {
    grid: DayGrid,
}

impl DaySlotIndexer {
    pub fn new(grid: DayGrid) -> Self {
        Self { grid }
    }
}

impl Indexer for DaySlotIndexer {
    const UNIT: Unit = Unit::DaySlots;

    fn handle(&mut self, request: Request) -> Result<Reply, RequestError> {
        match request {
            Request::DayIndex(payload) => Ok(Reply::Day(index_day(&payload, &self.grid))),
            _ => Err(RequestError::Unsupported("month request sent to day indexer".into())),
        }
    }
}
