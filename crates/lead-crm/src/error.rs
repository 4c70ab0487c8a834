use thiserror::Error;

/// Typed CRM error per spec §4.1 — every client operation returns either a
/// value or one of these variants.
#[derive(Debug, Error, Clone)]
pub enum CrmError {
    #[error("not found")]
    NotFound,
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("auth failed")]
    AuthFailed,
    #[error("transient error: {0}")]
    Transient(String),
    #[error("permanent error: {0}")]
    Permanent(String),
}

impl CrmError {
    /// Whether the client's retry loop should retry this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CrmError::Transient(_) | CrmError::RateLimited { .. })
    }
}

impl From<CrmError> for lead_core::RouterError {
    fn from(e: CrmError) -> Self {
        match e {
            CrmError::NotFound => lead_core::RouterError::PermanentCrmError("not found".into()),
            CrmError::RateLimited { .. } | CrmError::Transient(_) => {
                lead_core::RouterError::CrmUnavailable(e.to_string())
            }
            CrmError::AuthFailed => lead_core::RouterError::AuthFailed,
            CrmError::Permanent(msg) => lead_core::RouterError::PermanentCrmError(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, CrmError>;
