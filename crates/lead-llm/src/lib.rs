pub mod anthropic;
pub mod generator;

pub use anthropic::AnthropicGenerator;
pub use generator::{GenerationRequest, GenerationResult, Generator, GeneratorError, GeneratorMessage, GeneratorRole, ToolCall};
