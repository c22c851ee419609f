use std::collections::VecDeque;
use std::fmt::Display;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::{Result, SessionizeError};
use crate::models::{Event, LabeledEvent, Session, Timestamp};
use crate::partition::{entity_runs, EntityRuns};

use super::aggregate::{aggregate_sessions, CountOnly, Reducer};
use super::config::{FailurePolicy, SessionizerConfig};
use super::gap::detect_boundaries;
use super::index::assign_indices;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Gap detection, index assignment and aggregation wired together.
///
/// Configuration and reducer are fixed at construction and shared read-only
/// by every run, including parallel workers.
pub struct Sessionizer<R> {
    config: SessionizerConfig,
    reducer: Arc<R>,
}

impl<R> Clone for Sessionizer<R> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            reducer: Arc::clone(&self.reducer),
        }
    }
}

/// Outcome of a whole batch run.
#[derive(Debug)]
pub struct SessionizeReport<K, T, A> {
    pub sessions: Vec<Session<K, T, A>>,
    /// Sessions dropped because their reducer failed (`FailurePolicy::Isolate`)
    pub failures: Vec<SessionizeError>,
}

impl<K, T, A> SessionizeReport<K, T, A> {
    pub fn new() -> Self {
        Self {
            sessions: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl<K, T, A> Default for SessionizeReport<K, T, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Sessionizer<R> {
    pub fn new(config: SessionizerConfig, reducer: R) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            reducer: Arc::new(reducer),
        })
    }

    pub fn config(&self) -> &SessionizerConfig {
        &self.config
    }

    pub fn reducer(&self) -> &R {
        &self.reducer
    }

    /// Label one entity's run with boundary flags and session indices.
    ///
    /// `events` must all share one `entity_id` and be sorted by timestamp.
    pub fn label_entity<K, T, P>(
        &self,
        events: Vec<Event<K, T, P>>,
    ) -> Result<Vec<LabeledEvent<K, T, P>>>
    where
        K: Eq + Display,
        T: Timestamp,
    {
        let Some(first) = events.first() else {
            return Ok(Vec::new());
        };
        debug_assert!(events.iter().all(|e| e.entity_id == first.entity_id));

        let flags = detect_boundaries(&first.entity_id, &events, self.config.timeout)?;
        let indices = assign_indices(&flags);

        Ok(events
            .into_iter()
            .zip(flags)
            .zip(indices)
            .map(|((event, new_session), session_index)| LabeledEvent {
                event,
                new_session,
                session_index,
            })
            .collect())
    }

    /// Sessionize one entity's run.
    ///
    /// The outer error is fatal for the run (ordering); inner errors are
    /// per-session reducer failures.
    pub fn sessionize_entity<K, T, P>(
        &self,
        events: Vec<Event<K, T, P>>,
    ) -> Result<Vec<Result<Session<K, T, R::Output>>>>
    where
        K: Eq + Hash + Clone + Display,
        T: Timestamp,
        R: Reducer<P>,
    {
        let labeled = self.label_entity(events)?;
        Ok(aggregate_sessions(labeled, self.reducer.as_ref()))
    }

    /// Lazily sessionize an entity-grouped, timestamp-sorted event stream.
    ///
    /// Each entity's run is buffered in full before its sessions are
    /// emitted, so a session never comes out half assigned.
    pub fn sessions<I, K, T, P>(&self, events: I) -> Sessions<'_, I::IntoIter, R, K, T, P>
    where
        I: IntoIterator<Item = Event<K, T, P>>,
        K: Eq + Hash + Clone + Display,
        T: Timestamp,
        R: Reducer<P>,
    {
        Sessions {
            sessionizer: self,
            runs: self.entity_runs(events),
            pending: VecDeque::new(),
            cancel_token: None,
            done: false,
            _payload: PhantomData,
        }
    }

    /// Split `events` into entity runs, checking for fragmented entities
    /// when the config asks for it.
    pub(crate) fn entity_runs<I, K, T, P>(&self, events: I) -> EntityRuns<I::IntoIter, K>
    where
        I: IntoIterator<Item = Event<K, T, P>>,
    {
        let runs = entity_runs(events);
        if self.config.detect_fragmented_entities {
            runs.with_fragment_check()
        } else {
            runs
        }
    }

    /// Run the stream to completion, applying the configured failure policy.
    pub fn sessionize_batch<I, K, T, P>(
        &self,
        events: I,
    ) -> Result<SessionizeReport<K, T, R::Output>>
    where
        I: IntoIterator<Item = Event<K, T, P>>,
        K: Eq + Hash + Clone + Display,
        T: Timestamp,
        R: Reducer<P>,
    {
        collect_report(self.sessions(events), self.config.failure_policy)
    }
}

impl Sessionizer<CountOnly> {
    /// Event-counting sessionizer with a custom configuration.
    pub fn with_config(config: SessionizerConfig) -> Result<Self> {
        Self::new(config, CountOnly)
    }
}

/// Event-counting sessionizer with the default 30 minute timeout.
impl Default for Sessionizer<CountOnly> {
    fn default() -> Self {
        Self {
            config: SessionizerConfig::default(),
            reducer: Arc::new(CountOnly),
        }
    }
}

pub(crate) fn collect_report<K, T, A>(
    results: impl IntoIterator<Item = Result<Session<K, T, A>>>,
    policy: FailurePolicy,
) -> Result<SessionizeReport<K, T, A>> {
    let mut report = SessionizeReport::new();
    for result in results {
        match result {
            Ok(session) => report.sessions.push(session),
            Err(err) if !err.is_fatal() && policy == FailurePolicy::Isolate => {
                report.failures.push(err)
            }
            Err(err) => return Err(err),
        }
    }

    log_info!(
        "sessionized into {} sessions ({} failed)",
        report.sessions.len(),
        report.failures.len()
    );
    Ok(report)
}

/// Lazy session stream returned by [`Sessionizer::sessions`].
///
/// Yields `Err` for reducer failures (continuing under
/// `FailurePolicy::Isolate`) and for fatal errors, after which it ends.
pub struct Sessions<'a, I, R, K, T, P>
where
    I: Iterator<Item = Event<K, T, P>>,
    R: Reducer<P>,
{
    sessionizer: &'a Sessionizer<R>,
    runs: EntityRuns<I, K>,
    pending: VecDeque<Result<Session<K, T, R::Output>>>,
    cancel_token: Option<CancellationToken>,
    done: bool,
    _payload: PhantomData<fn(P)>,
}

impl<'a, I, R, K, T, P> Sessions<'a, I, R, K, T, P>
where
    I: Iterator<Item = Event<K, T, P>>,
    R: Reducer<P>,
{
    /// Stop between entities once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    fn finish(&mut self) {
        self.done = true;
        self.pending.clear();
    }
}

impl<'a, I, R, K, T, P> Iterator for Sessions<'a, I, R, K, T, P>
where
    I: Iterator<Item = Event<K, T, P>>,
    K: Eq + Hash + Clone + Display,
    T: Timestamp,
    R: Reducer<P>,
{
    type Item = Result<Session<K, T, R::Output>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                if let Err(err) = &item {
                    log_warn!("{err}");
                    if err.is_fatal()
                        || self.sessionizer.config.failure_policy == FailurePolicy::FailFast
                    {
                        self.finish();
                    }
                }
                return Some(item);
            }

            if self.done {
                return None;
            }

            if self
                .cancel_token
                .as_ref()
                .is_some_and(CancellationToken::is_cancelled)
            {
                log_info!("sessionization cancelled between entities");
                self.finish();
                return Some(Err(SessionizeError::Cancelled));
            }

            match self.runs.next() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Err(err)) => {
                    log_error!("{err}");
                    self.finish();
                    return Some(Err(err));
                }
                Some(Ok(run)) => {
                    log_debug!("sessionizing {} events", run.len());
                    match self.sessionizer.sessionize_entity(run) {
                        Ok(results) => self.pending.extend(results),
                        Err(err) => {
                            log_error!("{err}");
                            self.finish();
                            return Some(Err(err));
                        }
                    }
                }
            }
        }
    }
}
