//! Gap-based sessionization of timestamped event streams.
//!
//! Events grouped by entity and sorted by time are split into sessions
//! wherever the gap between consecutive events reaches the inactivity
//! timeout; each session is then reduced into a [`Session`] record.
//!
//! ```ignore
//! let sessionizer = Sessionizer::new(SessionizerConfig::default(), CountOnly)?;
//! let report = sessionizer.sessionize_batch(events)?;
//! ```

pub mod error;
pub mod models;
pub mod partition;
pub mod sessionization;
pub mod settings;
pub mod utils;

pub use error::{Result, SessionizeError};
pub use models::{Event, LabeledEvent, Session, Timestamp};
pub use partition::{entity_runs, sort_for_sessionizing, EntityRuns};
pub use sessionization::{
    aggregate_sessions, assign_indices, detect_boundaries, sessionize_parallel, CollectPayloads,
    CountOnly, FailurePolicy, LastValue, Reducer, SessionizeReport, Sessionizer,
    SessionizerConfig, Sessions,
};
pub use settings::SettingsFile;
pub use utils::init_logging;
