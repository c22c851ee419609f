//! Session output record.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use uuid::Uuid;

use super::event::Timestamp;

/// A maximal run of one entity's events with every gap below the timeout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session<K, T, A> {
    pub entity_id: K,
    pub session_index: u64,
    pub start_timestamp: T,
    pub end_timestamp: T,
    pub event_count: usize,
    pub aggregate: A,
}

impl<K, T: Timestamp, A> Session<K, T, A> {
    pub fn duration(&self) -> Duration {
        self.end_timestamp.elapsed_since(&self.start_timestamp)
    }
}

impl<K: Display, T, A> Session<K, T, A> {
    /// Stable identifier derived from `(entity_id, session_index)`; identical
    /// across runs over the same input.
    pub fn session_key(&self) -> Uuid {
        let name = format!("{}\u{1f}{}", self.entity_id, self.session_index);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(entity: &str, index: u64) -> Session<String, i64, ()> {
        Session {
            entity_id: entity.to_string(),
            session_index: index,
            start_timestamp: 1_000,
            end_timestamp: 61_000,
            event_count: 3,
            aggregate: (),
        }
    }

    #[test]
    fn duration_spans_first_to_last_event() {
        assert_eq!(session("a", 0).duration(), Duration::seconds(60));
    }

    #[test]
    fn session_key_is_deterministic_and_distinct() {
        assert_eq!(session("a", 0).session_key(), session("a", 0).session_key());
        assert_ne!(session("a", 0).session_key(), session("a", 1).session_key());
        assert_ne!(session("a", 1).session_key(), session("b", 1).session_key());
    }
}
