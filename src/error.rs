use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionizeError {
    #[error("events out of order for entity {entity_id} at position {position}: {current} precedes {previous}")]
    OrderingViolation {
        entity_id: String,
        position: usize,
        previous: String,
        current: String,
    },

    #[error("entity {entity_id} reappeared after its run ended; input must be grouped by entity")]
    FragmentedEntity { entity_id: String },

    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("reducer failed for entity {entity_id} session {session_index}: {source}")]
    ReducerFailure {
        entity_id: String,
        session_index: u64,
        #[source]
        source: anyhow::Error,
    },

    #[error("sessionization cancelled")]
    Cancelled,

    #[error("sessionization worker failed: {reason}")]
    WorkerFailed { reason: String },

    #[error("settings error: {0:#}")]
    Settings(#[from] anyhow::Error),
}

impl SessionizeError {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        SessionizeError::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    /// Errors that end the whole run regardless of failure policy.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SessionizeError::ReducerFailure { .. })
    }
}

pub type Result<T> = std::result::Result<T, SessionizeError>;
