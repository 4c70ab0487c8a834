pub mod node;
pub mod runtime;
pub mod supervisor;

pub use node::{Node, StatePatch};
pub use runtime::{GraphRuntime, InboundMessage, RuntimeConfig, STEP_BOUND};
