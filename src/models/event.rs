//! Event data model.
//!
//! An event is one tracked action for an entity. Events arrive already
//! normalized: grouped by `entity_id` and sorted by `timestamp` within each
//! group.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A point in time that can be totally ordered and subtracted.
pub trait Timestamp: Ord + Clone + Debug + Send + Sync {
    /// Signed gap from `earlier` to `self`.
    fn elapsed_since(&self, earlier: &Self) -> Duration;
}

impl Timestamp for DateTime<Utc> {
    fn elapsed_since(&self, earlier: &Self) -> Duration {
        self.signed_duration_since(*earlier)
    }
}

impl Timestamp for NaiveDateTime {
    fn elapsed_since(&self, earlier: &Self) -> Duration {
        self.signed_duration_since(*earlier)
    }
}

/// Epoch milliseconds.
impl Timestamp for i64 {
    fn elapsed_since(&self, earlier: &Self) -> Duration {
        Duration::milliseconds(self.saturating_sub(*earlier))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event<K, T, P> {
    pub entity_id: K,
    pub timestamp: T,
    pub payload: P,
}

impl<K, T, P> Event<K, T, P> {
    pub fn new(entity_id: K, timestamp: T, payload: P) -> Self {
        Self {
            entity_id,
            timestamp,
            payload,
        }
    }
}

/// An event after gap detection and index assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabeledEvent<K, T, P> {
    pub event: Event<K, T, P>,
    pub new_session: bool,
    pub session_index: u64,
}
