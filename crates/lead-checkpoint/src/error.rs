use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<CheckpointError> for lead_core::RouterError {
    fn from(e: CheckpointError) -> Self {
        lead_core::RouterError::CheckpointError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CheckpointError>;
