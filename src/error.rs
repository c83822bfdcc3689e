use thiserror::Error;

use crate::models::FailureReason;

/// Failures the guard distinguishes. Only `PermissionDenied` is fatal, and
/// only at startup; everything on the decision path degrades to letting the
/// keystroke through unmodified.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("{capability} permission not granted")]
    PermissionDenied { capability: Capability },
    #[error("validation failed: {0}")]
    ValidationFailed(FailureReason),
    #[error("could not read focused field: {0}")]
    FieldReadFailed(String),
    #[error("could not write focused field: {0}")]
    FieldWriteFailed(String),
    #[error("focused element unavailable: {0}")]
    FocusUnavailable(String),
    #[error("coordinator is no longer running")]
    CoordinatorClosed,
}

/// OS capability a collaborator needs before the coordinator can start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Accessibility,
    InputMonitoring,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Accessibility => f.write_str("accessibility"),
            Capability::InputMonitoring => f.write_str("input monitoring"),
        }
    }
}

impl GuardError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, GuardError::PermissionDenied { .. })
    }
}

pub type GuardResult<T> = std::result::Result<T, GuardError>;
