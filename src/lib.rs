//! Reservation indexing engine for a lesson calendar.
//!
//! Two independent units turn raw reservation records into render-ready
//! structures: the day slot indexer (a per-instructor time grid for one day)
//! and the month scene indexer (a stateful, fully re-derived month view).

pub mod client;
pub mod config;
pub mod day_slots;
pub mod fields;
pub mod model;
pub mod observability;
pub mod protocol;
pub mod scene;
pub mod temporal;
pub mod worker;
