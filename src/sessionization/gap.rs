use chrono::Duration;
use std::fmt::Display;

use crate::error::{Result, SessionizeError};
use crate::models::{Event, Timestamp};

/// Flag each event that starts a new session.
///
/// `events` is one entity's run, sorted ascending by timestamp. The first
/// event always starts a session; any later event starts one when its gap to
/// the previous event is `>= timeout`. A timestamp that goes backwards is an
/// `OrderingViolation`; nothing is reordered.
pub fn detect_boundaries<K, T, P>(
    entity_id: &K,
    events: &[Event<K, T, P>],
    timeout: Duration,
) -> Result<Vec<bool>>
where
    K: Display,
    T: Timestamp,
{
    let (_, flags) = events.iter().enumerate().try_fold(
        (None::<&T>, Vec::with_capacity(events.len())),
        |(previous, mut flags), (position, event)| {
            let current = &event.timestamp;
            let starts_session = match previous {
                None => true,
                Some(prev) if current < prev => {
                    return Err(SessionizeError::OrderingViolation {
                        entity_id: entity_id.to_string(),
                        position,
                        previous: format!("{prev:?}"),
                        current: format!("{current:?}"),
                    });
                }
                Some(prev) => current.elapsed_since(prev) >= timeout,
            };
            flags.push(starts_session);
            Ok((Some(current), flags))
        },
    )?;

    Ok(flags)
}
