use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A message fed to the external generator, in the roles it understands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorMessage {
    pub role: GeneratorRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorRole {
    User,
    Assistant,
}

/// A tool invocation the generator asked for. The core treats this as
/// opaque data — specialist nodes decide whether to act on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_prompt: String,
    /// Only the reconciled history's messages; the core passes just the
    /// latest customer turn as the final user message, per spec §4.6 —
    /// never the full history, to keep the generator from re-deriving
    /// state the graph already owns.
    pub messages: Vec<GeneratorMessage>,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub reply_text: String,
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("generator API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("could not parse generator response: {0}")]
    Parse(String),
    #[error("generator timed out")]
    Timeout,
}

impl From<GeneratorError> for lead_core::RouterError {
    fn from(e: GeneratorError) -> Self {
        lead_core::RouterError::GeneratorError(e.to_string())
    }
}

/// The one opaque seam spec.md §1 names as out-of-scope internals: the
/// core never knows which model or vendor sits behind it.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResult, GeneratorError>;
}
