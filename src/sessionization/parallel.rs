use std::fmt::Display;
use std::hash::Hash;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SessionizeError};
use crate::models::{Event, Session, Timestamp};

use super::aggregate::Reducer;
use super::config::FailurePolicy;
use super::pipeline::{collect_report, SessionizeReport, Sessionizer};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

type ChunkResult<K, T, A> = Result<Vec<Result<Session<K, T, A>>>>;

/// Sessionize entities concurrently on blocking workers.
///
/// Entity runs are split into at most `max_workers` contiguous chunks;
/// results are concatenated in input order, so the output matches
/// [`Sessionizer::sessionize_batch`] on the same input. `cancel_token` is
/// checked between entities. A fatal error in one worker, including a panic,
/// cancels the others.
pub async fn sessionize_parallel<R, K, T, P>(
    sessionizer: &Sessionizer<R>,
    events: Vec<Event<K, T, P>>,
    cancel_token: CancellationToken,
) -> Result<SessionizeReport<K, T, R::Output>>
where
    R: Reducer<P> + 'static,
    R::Output: Send + 'static,
    K: Eq + Hash + Clone + Display + Send + 'static,
    T: Timestamp + 'static,
    P: Send + 'static,
{
    let runs = sessionizer.entity_runs(events).collect::<Result<Vec<_>>>()?;
    if runs.is_empty() {
        return Ok(SessionizeReport::new());
    }

    let policy = sessionizer.config().failure_policy;
    let workers = sessionizer.config().max_workers.min(runs.len());
    let chunk_size = runs.len().div_ceil(workers);
    log_info!("sessionizing {} entity runs on {} workers", runs.len(), workers);

    let run_token = cancel_token.child_token();
    let mut runs = runs.into_iter();
    let mut handles: Vec<JoinHandle<ChunkResult<K, T, R::Output>>> = Vec::with_capacity(workers);
    loop {
        let chunk: Vec<_> = runs.by_ref().take(chunk_size).collect();
        if chunk.is_empty() {
            break;
        }
        let sessionizer = sessionizer.clone();
        let token = run_token.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            // cancels the siblings if the chunk unwinds
            let guard = token.clone().drop_guard();
            let outcome = sessionize_chunk(&sessionizer, chunk, &token);
            guard.disarm();
            outcome
        }));
    }

    let mut results = Vec::new();
    let mut fatal: Option<SessionizeError> = None;
    for handle in handles {
        let outcome = handle
            .await
            .unwrap_or_else(|err| Err(SessionizeError::WorkerFailed {
                reason: err.to_string(),
            }));
        match outcome {
            Ok(chunk) => results.extend(chunk),
            Err(err) => {
                run_token.cancel();
                // A real failure outranks the cancellations it triggered.
                if matches!(fatal, None | Some(SessionizeError::Cancelled)) {
                    fatal = Some(err);
                }
            }
        }
    }

    if let Some(err) = fatal {
        log_warn!("parallel sessionization stopped: {err}");
        return Err(err);
    }

    collect_report(results, policy)
}

fn sessionize_chunk<R, K, T, P>(
    sessionizer: &Sessionizer<R>,
    chunk: Vec<Vec<Event<K, T, P>>>,
    token: &CancellationToken,
) -> ChunkResult<K, T, R::Output>
where
    R: Reducer<P>,
    K: Eq + Hash + Clone + Display,
    T: Timestamp,
{
    let fail_fast = sessionizer.config().failure_policy == FailurePolicy::FailFast;
    let mut out = Vec::new();

    for run in chunk {
        if token.is_cancelled() {
            return Err(SessionizeError::Cancelled);
        }

        let results = sessionizer.sessionize_entity(run).inspect_err(|_| token.cancel())?;
        for result in results {
            match result {
                Err(err) if fail_fast => {
                    token.cancel();
                    return Err(err);
                }
                other => out.push(other),
            }
        }
    }

    Ok(out)
}
