//! Workflow error types

use thiserror::Error;

use crate::gateway::ServiceError;

/// A local precondition was violated; no service was called
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("Request text is empty")]
    EmptyInput,

    #[error("Clarification text is empty")]
    EmptyClarification,

    #[error("Select a candidate for at least one service before validating")]
    NoSelection,

    #[error("No validated services to build an intent from")]
    NothingValidated,

    #[error("Another request is still in progress")]
    Busy,

    #[error("Cannot {operation} in step {step}")]
    WrongStep { operation: &'static str, step: &'static str },

    #[error("Unknown service '{0}'")]
    UnknownService(String),

    #[error("Service '{service}' has no candidate '{candidate}'")]
    UnknownCandidate { service: String, candidate: String },

    #[error("Clarification limit of {0} rounds reached; finish with the validated services or reset")]
    RoundLimitReached(u32),
}

/// Errors surfaced by workflow transitions
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl WorkflowError {
    /// Message shown to the user
    pub fn user_message(&self) -> String {
        match self {
            WorkflowError::Request(e) => e.to_string(),
            WorkflowError::Service(e) => e.message(),
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self, WorkflowError::Request(_))
    }

    pub fn is_service(&self) -> bool {
        matches!(self, WorkflowError::Service(_))
    }

    /// The request error, if this is one
    pub fn as_request(&self) -> Option<&RequestError> {
        match self {
            WorkflowError::Request(e) => Some(e),
            WorkflowError::Service(_) => None,
        }
    }
}
