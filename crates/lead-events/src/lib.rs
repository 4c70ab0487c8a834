pub mod engine;
pub mod types;

pub use engine::{EventBus, EventSink};
pub use types::RouterEvent;
