pub mod analyze;
pub mod extractor;
pub mod scorer;

pub use analyze::{analyze, IntelligenceOutcome};
