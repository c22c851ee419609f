//! Ordering and partitioning helpers shared by the sequential and parallel
//! pipelines.

use std::collections::HashSet;
use std::fmt::Display;
use std::hash::Hash;
use std::iter::Peekable;

use crate::error::{Result, SessionizeError};
use crate::models::{Event, Timestamp};

/// Splits an entity-grouped event stream into one `Vec` per entity.
///
/// Pulls lazily: only the current run is buffered. A run ends when the
/// entity changes, so an entity that shows up again later comes out as a
/// second run unless [`EntityRuns::with_fragment_check`] is on.
pub struct EntityRuns<I: Iterator, K> {
    events: Peekable<I>,
    finished: Option<HashSet<K>>,
    failed: bool,
}

pub fn entity_runs<I, K, T, P>(events: I) -> EntityRuns<I::IntoIter, K>
where
    I: IntoIterator<Item = Event<K, T, P>>,
{
    EntityRuns {
        events: events.into_iter().peekable(),
        finished: None,
        failed: false,
    }
}

impl<I: Iterator, K> EntityRuns<I, K> {
    /// Remember every finished entity and fail with `FragmentedEntity` when
    /// one reappears.
    ///
    /// Costs one stored `K` per distinct entity for the life of the
    /// iterator, so memory grows with the number of entities seen. Leave it
    /// off for unbounded streams.
    pub fn with_fragment_check(mut self) -> Self {
        self.finished = Some(HashSet::new());
        self
    }
}

impl<I, K, T, P> Iterator for EntityRuns<I, K>
where
    I: Iterator<Item = Event<K, T, P>>,
    K: Eq + Hash + Clone + Display,
{
    type Item = Result<Vec<Event<K, T, P>>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let first = self.events.next()?;
        if let Some(finished) = &self.finished {
            if finished.contains(&first.entity_id) {
                self.failed = true;
                return Some(Err(SessionizeError::FragmentedEntity {
                    entity_id: first.entity_id.to_string(),
                }));
            }
        }

        let mut run = vec![first];
        while let Some(event) = self.events.next_if(|e| e.entity_id == run[0].entity_id) {
            run.push(event);
        }

        if let Some(finished) = &mut self.finished {
            finished.insert(run[0].entity_id.clone());
        }
        Some(Ok(run))
    }
}

/// Stable sort into the order the pipeline expects: grouped by entity,
/// ascending by timestamp, ties kept in input order.
pub fn sort_for_sessionizing<K: Ord, T: Timestamp, P>(events: &mut [Event<K, T, P>]) {
    events.sort_by(|a, b| {
        a.entity_id
            .cmp(&b.entity_id)
            .then_with(|| a.timestamp.cmp(&b.timestamp))
    });
}
