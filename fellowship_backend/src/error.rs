use thiserror::Error;

/// Failures that callers are expected to react to. Services raise these
/// through `anyhow` and the API layer recovers them with `downcast_ref`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("system is already initialized")]
    AlreadyInitialized,
    #[error("system setup has not been completed")]
    SetupRequired,
    #[error("invalid state transition: {0}")]
    InvalidTransition(String),
    #[error("family {family_id} already has {limit} admins")]
    AdminLimitReached { family_id: String, limit: usize },
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("authentication required")]
    Unauthenticated,
    #[error("conflict: {0}")]
    Conflict(String),
}

impl ServiceError {
    pub fn denied(reason: impl Into<String>) -> Self {
        Self::PermissionDenied(reason.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }
}

/// Returns the typed failure carried by an `anyhow` error, if any.
pub fn service_error(err: &anyhow::Error) -> Option<&ServiceError> {
    err.downcast_ref::<ServiceError>()
}
