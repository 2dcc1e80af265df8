//! Orchestrator-specific error types

use shared::{ServiceError, SharedError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Unknown call: {id}")]
    UnknownCall { id: String },

    #[error("Call {id} is blocked until its dependency buckets complete")]
    CallBlocked { id: String },

    #[error("Call {id} is already in flight")]
    CallInFlight { id: String },

    #[error("Session has been torn down")]
    SessionClosed,

    #[error("Call failed: {0}")]
    Service(#[from] ServiceError),

    #[error("Shared component error: {0}")]
    SharedError(#[from] SharedError),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
