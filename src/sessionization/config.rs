use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionizeError};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

pub const DEFAULT_TIMEOUT_MINUTES: i64 = 30;

/// What happens to the rest of a run when a reducer fails on one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailurePolicy {
    /// Drop the failing session, report it, keep going.
    #[default]
    Isolate,
    /// Stop at the first failing session.
    FailFast,
}

/// Configuration for the sessionization pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionizerConfig {
    /// Inactivity gap that starts a new session (inclusive: `gap >= timeout`)
    pub timeout: Duration,

    pub failure_policy: FailurePolicy,

    /// Upper bound on blocking workers used by the parallel runner
    pub max_workers: usize,

    /// Reject an entity that reappears after its run ended.
    ///
    /// Off by default: the check keeps every entity id seen for the whole
    /// run, which is unbounded on long streams. When off, a reappearing
    /// entity is sessionized again from index 0.
    pub detect_fragmented_entities: bool,
}

impl Default for SessionizerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::minutes(DEFAULT_TIMEOUT_MINUTES),
            failure_policy: FailurePolicy::default(),
            max_workers: default_max_workers(),
            detect_fragmented_entities: false,
        }
    }
}

impl SessionizerConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_fragment_detection(mut self, enabled: bool) -> Self {
        self.detect_fragmented_entities = enabled;
        self
    }

    /// Reject values the pipeline cannot run with.
    ///
    /// A zero timeout is accepted: every event becomes its own session.
    pub fn validate(&self) -> Result<()> {
        if self.timeout < Duration::zero() {
            return Err(SessionizeError::invalid_config(format!(
                "timeout must not be negative (got {}ms)",
                self.timeout.num_milliseconds()
            )));
        }
        if self.timeout.is_zero() {
            log_warn!("timeout is zero; every event will start its own session");
        }
        if self.max_workers == 0 {
            return Err(SessionizeError::invalid_config(
                "max_workers must be at least 1",
            ));
        }
        Ok(())
    }
}

pub(crate) fn default_max_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
