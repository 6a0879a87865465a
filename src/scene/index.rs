use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use serde::Serialize;

use crate::model::*;
use crate::observability::build_ms;

use super::project::project;
use super::SceneState;

/// Full derived view of a scene. Rebuilt from scratch after every change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthIndex {
    pub month_key: String,
    pub day_entries: Vec<DayBucket>,
    pub search_catalog: Vec<SearchRecord>,
    pub event_id_to_day_entries: Vec<(String, Ms)>,
    pub events_count: usize,
    pub build_ms: f64,
}

/// Canonical order inside a day: start, instructor, id, local slot key.
pub fn canonical_order(a: &ProjectedEvent, b: &ProjectedEvent) -> Ordering {
    a.start_ms
        .cmp(&b.start_ms)
        .then_with(|| {
            let ai = a.instructor_id.as_deref().unwrap_or_default();
            let bi = b.instructor_id.as_deref().unwrap_or_default();
            ai.cmp(bi)
        })
        .then_with(|| a.id.cmp(&b.id))
        .then_with(|| a.local_slot_key.cmp(&b.local_slot_key))
}

pub(super) fn build_index(scene: &SceneState) -> MonthIndex {
    let started = Instant::now();

    let mut buckets: BTreeMap<Ms, Vec<ProjectedEvent>> = BTreeMap::new();
    for (key, entry) in &scene.entries_by_key {
        if let Some(event) = project(key, entry, scene) {
            buckets.entry(event.day_ts).or_default().push(event);
        }
    }
    for events in buckets.values_mut() {
        events.sort_by(canonical_order);
    }

    let mut search_catalog = Vec::new();
    let mut event_id_to_day_entries = Vec::new();
    let mut seen_ids: HashSet<&str> = HashSet::new();
    for (day_ts, events) in &buckets {
        for event in events {
            search_catalog.push(SearchRecord {
                day_ts: *day_ts,
                event_id: event.id.clone(),
                search_norm: event.search_norm.clone(),
                search_phone_digits: event.search_phone_digits.clone(),
            });
            if seen_ids.insert(event.id.as_str()) {
                event_id_to_day_entries.push((event.id.clone(), *day_ts));
            }
        }
    }

    let events_count = search_catalog.len();
    MonthIndex {
        month_key: scene.month_key.clone(),
        day_entries: buckets.into_iter().collect(),
        search_catalog,
        event_id_to_day_entries,
        events_count,
        build_ms: build_ms(started),
    }
}
