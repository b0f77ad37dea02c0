//! Live fan-out of new-capture notifications to connected observers.

pub mod broadcaster;
pub mod types;

pub use broadcaster::{LiveFeed, ObserverId};
pub use types::LiveEvent;
