use anyhow::anyhow;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

use crate::error::{Result, SessionizeError};
use crate::models::{LabeledEvent, Session, Timestamp};

const ENABLE_LOGS: bool = false;

use crate::log_debug;

/// Reduces the payloads of one session into an aggregate value.
///
/// Payloads arrive in the session's event order. Closures of the form
/// `Fn(&[P]) -> anyhow::Result<O>` are reducers too.
pub trait Reducer<P>: Send + Sync {
    type Output;

    fn reduce(&self, payloads: &[P]) -> anyhow::Result<Self::Output>;
}

impl<P, O, F> Reducer<P> for F
where
    F: Fn(&[P]) -> anyhow::Result<O> + Send + Sync,
{
    type Output = O;

    fn reduce(&self, payloads: &[P]) -> anyhow::Result<O> {
        self(payloads)
    }
}

/// Only `start_timestamp` and `event_count`; payloads are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountOnly;

impl<P> Reducer<P> for CountOnly {
    type Output = ();

    fn reduce(&self, _payloads: &[P]) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Payload of the session's last event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LastValue;

impl<P: Clone> Reducer<P> for LastValue {
    type Output = P;

    fn reduce(&self, payloads: &[P]) -> anyhow::Result<P> {
        payloads
            .last()
            .cloned()
            .ok_or_else(|| anyhow!("session has no payloads"))
    }
}

/// Every payload of the session, in event order.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectPayloads;

impl<P: Clone> Reducer<P> for CollectPayloads {
    type Output = Vec<P>;

    fn reduce(&self, payloads: &[P]) -> anyhow::Result<Vec<P>> {
        Ok(payloads.to_vec())
    }
}

/// Events of one `(entity_id, session_index)` group.
struct SessionGroup<K, T, P> {
    entity_id: K,
    session_index: u64,
    start: T,
    end: T,
    payloads: Vec<P>,
}

impl<K, T: Timestamp, P> SessionGroup<K, T, P> {
    fn open(entity_id: K, session_index: u64, timestamp: T, payload: P) -> Self {
        Self {
            entity_id,
            session_index,
            start: timestamp.clone(),
            end: timestamp,
            payloads: vec![payload],
        }
    }

    fn push(&mut self, timestamp: T, payload: P) {
        if timestamp < self.start {
            self.start = timestamp.clone();
        }
        if timestamp > self.end {
            self.end = timestamp;
        }
        self.payloads.push(payload);
    }
}

/// Group labeled events by `(entity_id, session_index)` and reduce each group.
///
/// Every input event lands in exactly one group. Sessions come out in order
/// of their first event. A reducer failure only affects its own session and
/// is returned in that session's slot.
pub fn aggregate_sessions<K, T, P, R>(
    labeled: Vec<LabeledEvent<K, T, P>>,
    reducer: &R,
) -> Vec<Result<Session<K, T, R::Output>>>
where
    K: Eq + Hash + Clone + Display,
    T: Timestamp,
    R: Reducer<P> + ?Sized,
{
    let mut slots: HashMap<(K, u64), usize> = HashMap::new();
    let mut groups: Vec<SessionGroup<K, T, P>> = Vec::new();

    for item in labeled {
        let event = item.event;
        let key = (event.entity_id, item.session_index);
        match slots.get(&key) {
            Some(&slot) => groups[slot].push(event.timestamp, event.payload),
            None => {
                groups.push(SessionGroup::open(
                    key.0.clone(),
                    key.1,
                    event.timestamp,
                    event.payload,
                ));
                slots.insert(key, groups.len() - 1);
            }
        }
    }

    log_debug!("aggregating {} session groups", groups.len());

    groups
        .into_iter()
        .map(|group| -> Result<Session<K, T, R::Output>> {
            let aggregate = reducer.reduce(&group.payloads).map_err(|source| {
                SessionizeError::ReducerFailure {
                    entity_id: group.entity_id.to_string(),
                    session_index: group.session_index,
                    source,
                }
            })?;

            Ok(Session {
                entity_id: group.entity_id,
                session_index: group.session_index,
                start_timestamp: group.start,
                end_timestamp: group.end,
                event_count: group.payloads.len(),
                aggregate,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Event;
    use anyhow::bail;

    fn labeled(
        entity: &'static str,
        ts: i64,
        index: u64,
        payload: i32,
    ) -> LabeledEvent<&'static str, i64, i32> {
        LabeledEvent {
            event: Event::new(entity, ts, payload),
            new_session: false,
            session_index: index,
        }
    }

    #[test]
    fn groups_by_entity_and_index() {
        let input = vec![
            labeled("a", 0, 0, 1),
            labeled("a", 10, 0, 2),
            labeled("a", 50, 1, 3),
            labeled("b", 5, 0, 4),
        ];

        let sessions: Vec<_> = aggregate_sessions(input, &CountOnly)
            .into_iter()
            .map(|s| s.unwrap())
            .collect();

        assert_eq!(sessions.len(), 3);
        assert_eq!((sessions[0].entity_id, sessions[0].session_index), ("a", 0));
        assert_eq!(sessions[0].event_count, 2);
        assert_eq!(sessions[0].start_timestamp, 0);
        assert_eq!(sessions[0].end_timestamp, 10);
        assert_eq!((sessions[1].entity_id, sessions[1].session_index), ("a", 1));
        assert_eq!((sessions[2].entity_id, sessions[2].session_index), ("b", 0));
    }

    #[test]
    fn start_is_minimum_even_when_groups_interleave() {
        let input = vec![
            labeled("a", 20, 0, 1),
            labeled("b", 0, 0, 2),
            labeled("a", 5, 0, 3),
        ];

        let sessions = aggregate_sessions(input, &CountOnly);
        let a = sessions[0].as_ref().unwrap();
        assert_eq!(a.start_timestamp, 5);
        assert_eq!(a.end_timestamp, 20);
        assert_eq!(a.event_count, 2);
    }

    #[test]
    fn builtin_reducers() {
        let input = || vec![labeled("a", 0, 0, 1), labeled("a", 1, 0, 2)];

        let last = aggregate_sessions(input(), &LastValue);
        assert_eq!(last[0].as_ref().unwrap().aggregate, 2);

        let all = aggregate_sessions(input(), &CollectPayloads);
        assert_eq!(all[0].as_ref().unwrap().aggregate, vec![1, 2]);
    }

    #[test]
    fn closure_reducer_sums_payloads() {
        let sum = |payloads: &[i32]| -> anyhow::Result<i32> { Ok(payloads.iter().sum()) };
        let sessions = aggregate_sessions(
            vec![labeled("a", 0, 0, 4), labeled("a", 1, 0, 6)],
            &sum,
        );
        assert_eq!(sessions[0].as_ref().unwrap().aggregate, 10);
    }

    #[test]
    fn reducer_failure_is_isolated_and_tagged() {
        let picky = |payloads: &[i32]| -> anyhow::Result<usize> {
            if payloads.contains(&13) {
                bail!("unlucky payload");
            }
            Ok(payloads.len())
        };
        let input = vec![
            labeled("a", 0, 0, 1),
            labeled("a", 90, 1, 13),
            labeled("a", 200, 2, 2),
        ];

        let results = aggregate_sessions(input, &picky);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[2].is_ok());
        match &results[1] {
            Err(SessionizeError::ReducerFailure {
                entity_id,
                session_index,
                ..
            }) => {
                assert_eq!(entity_id, "a");
                assert_eq!(*session_index, 1);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn empty_input_yields_nothing() {
        let sessions = aggregate_sessions(Vec::<LabeledEvent<&str, i64, i32>>::new(), &CountOnly);
        assert!(sessions.is_empty());
    }
}
