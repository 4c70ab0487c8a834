use thiserror::Error;

/// Shared error type at crate boundaries (graph runtime, gateway).
///
/// Maps 1:1 onto the error kinds named in spec §7; `code()` gives each a
/// stable string for structured logging and metrics labeling.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("CRM unavailable: {0}")]
    CrmUnavailable(String),

    #[error("CRM auth failed")]
    AuthFailed,

    #[error("CRM rejected the request: {0}")]
    PermanentCrmError(String),

    #[error("generator error: {0}")]
    GeneratorError(String),

    #[error("extraction error: {0}")]
    ExtractionError(String),

    #[error("routing loop: exceeded {0} attempts")]
    RoutingLoop(u8),

    #[error("step budget exceeded: {0} node entries")]
    StepBudgetExceeded(u32),

    #[error("send failure: {0}")]
    SendFailure(String),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("checkpoint error: {0}")]
    CheckpointError(String),

    #[error("turn cancelled")]
    Cancelled,
}

impl RouterError {
    pub fn code(&self) -> &'static str {
        match self {
            RouterError::CrmUnavailable(_) => "CRM_UNAVAILABLE",
            RouterError::AuthFailed => "AUTH_FAILED",
            RouterError::PermanentCrmError(_) => "PERMANENT_CRM_ERROR",
            RouterError::GeneratorError(_) => "GENERATOR_ERROR",
            RouterError::ExtractionError(_) => "EXTRACTION_ERROR",
            RouterError::RoutingLoop(_) => "ROUTING_LOOP",
            RouterError::StepBudgetExceeded(_) => "STEP_BUDGET_EXCEEDED",
            RouterError::SendFailure(_) => "SEND_FAILURE",
            RouterError::ConfigError(_) => "CONFIG_ERROR",
            RouterError::CheckpointError(_) => "CHECKPOINT_ERROR",
            RouterError::Cancelled => "CANCELLED",
        }
    }
}

pub type Result<T> = std::result::Result<T, RouterError>;
