pub mod aggregate;
pub mod config;
pub mod gap;
pub mod index;
pub mod parallel;
pub mod pipeline;

pub use aggregate::{aggregate_sessions, CollectPayloads, CountOnly, LastValue, Reducer};
pub use config::{FailurePolicy, SessionizerConfig};
pub use gap::detect_boundaries;
pub use index::assign_indices;
pub use parallel::sessionize_parallel;
pub use pipeline::{SessionizeReport, Sessionizer, Sessions};
