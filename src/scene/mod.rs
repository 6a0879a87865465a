mod error;
mod index;
mod project;

pub use error::SceneError;
pub use index::{canonical_order, MonthIndex};
pub use project::{gearbox_label, normalize_search, phone_digits};

use std::collections::{BTreeMap, HashMap};

use chrono_tz::Tz;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::Config;
use crate::fields::scalar_text;
use crate::model::ReservationEntry;
use crate::protocol::{positive_or, MonthPatchPayload, MonthResetPayload, Reply, Request, RequestError, Unit};
use crate::temporal::ZoneCache;
use crate::worker::Indexer;

use index::build_index;

/// Reference tables sent with a reset, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct Lookups {
    pub students_by_id: HashMap<String, Value>,
    pub group_name_by_id: HashMap<String, Value>,
    pub instructor_meta_by_id: HashMap<String, Value>,
}

/// One loaded month. `entries_by_key` is the only source of truth; every
/// derived structure is recomputed from it.
#[derive(Debug, Clone)]
pub struct SceneState {
    pub month_key: String,
    pub time_zone: Tz,
    pub lesson_minutes: u32,
    pub lookups: Lookups,
    pub entries_by_key: BTreeMap<String, ReservationEntry>,
}

/// Stateful unit serving `index-month`, `index-month-reset` and `index-month-patch`.
#[derive(Debug)]
pub struct MonthScene {
    zones: ZoneCache,
    default_lesson_minutes: u32,
    state: Option<SceneState>,
}

impl MonthScene {
    pub fn new(zones: ZoneCache, default_lesson_minutes: u32) -> Self {
        Self {
            zones,
            default_lesson_minutes,
            state: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(ZoneCache::new(&config.time_zone), config.lesson_minutes)
    }

    pub fn month_key(&self) -> Option<&str> {
        self.state.as_ref().map(|s| s.month_key.as_str())
    }

    pub fn entry_count(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.entries_by_key.len())
    }

    /// Replace the whole scene. Entries without an entry key are dropped.
    pub fn reset(&mut self, payload: MonthResetPayload) -> MonthIndex {
        let time_zone = self.zones.resolve(payload.time_zone.as_deref());
        let lesson_minutes = positive_or(payload.lesson_minutes, self.default_lesson_minutes);

        let mut entries_by_key = BTreeMap::new();
        let mut keyless = 0usize;
        for entry in payload.reservations {
            match entry.entry_key() {
                Some(key) => {
                    entries_by_key.insert(key, entry);
                }
                None => keyless += 1,
            }
        }

        let month_key = payload.month_key.trim().to_string();
        info!(
            "month scene reset: {month_key} ({} entries, {keyless} without key, zone {})",
            entries_by_key.len(),
            time_zone.name()
        );

        let state = self.state.insert(SceneState {
            month_key,
            time_zone,
            lesson_minutes,
            lookups: Lookups {
                students_by_id: payload.students_by_id,
                group_name_by_id: payload.group_name_by_id,
                instructor_meta_by_id: payload.instructor_meta_by_id,
            },
            entries_by_key,
        });
        publish(state)
    }

    /// Apply removals, then upserts, to the loaded month.
    pub fn patch(&mut self, payload: MonthPatchPayload) -> Result<MonthIndex, SceneError> {
        let state = self.state.as_mut().ok_or(SceneError::NotInitialized)?;
        let requested = payload.month_key.trim();
        if !requested.is_empty() && requested != state.month_key {
            return Err(SceneError::MonthMismatch {
                loaded: state.month_key.clone(),
                requested: requested.to_string(),
            });
        }

        let mut removed = 0usize;
        for key in payload.removals.iter().filter_map(scalar_text) {
            if state.entries_by_key.remove(&key).is_some() {
                removed += 1;
            }
        }
        let mut upserted = 0usize;
        for entry in payload.upserts {
            if let Some(key) = entry.entry_key() {
                state.entries_by_key.insert(key, entry);
                upserted += 1;
            }
        }
        debug!(
            "month scene patch: {} (-{removed} +{upserted}, {} entries)",
            state.month_key,
            state.entries_by_key.len()
        );

        Ok(publish(state))
    }

    /// Derived view of the current scene.
    pub fn index(&self) -> Result<MonthIndex, SceneError> {
        self.state.as_ref().map(build_index).ok_or(SceneError::NotInitialized)
    }
}

fn publish(state: &SceneState) -> MonthIndex {
    metrics::gauge!(crate::observability::SCENE_ENTRIES).set(state.entries_by_key.len() as f64);
    build_index(state)
}

impl Indexer for MonthScene {
    const UNIT: Unit = Unit::MonthScene;

    fn handle(&mut self, request: Request) -> Result<Reply, RequestError> {
        match request {
            Request::MonthReset(payload) => Ok(Reply::Month(self.reset(payload))),
            Request::MonthPatch(payload) => Ok(Reply::Month(self.patch(payload)?)),
            Request::DayIndex(_) => {
                Err(RequestError::Unsupported("day request sent to month indexer".into()))
            }
        }
    }
}
