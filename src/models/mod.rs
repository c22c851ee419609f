pub mod event;
pub mod session;

pub use event::{Event, LabeledEvent, Timestamp};
pub use session::Session;
