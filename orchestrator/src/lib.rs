//! Per-session request orchestration for a data-heavy dashboard
//!
//! Calls are registered into priority buckets with dependencies, released as
//! their dependency buckets drain past a completion threshold, and tracked
//! through to resolution. The session stage only ever moves forward.

pub mod core;
pub mod deferred;
pub mod error;
pub mod orchestrator;

// Re-export commonly used types
pub use self::core::{
    BucketProgress, CallDescriptor, CallPhase, CallRegistry, CallSnapshot, Resolution,
    SessionSnapshot, SessionState, StageProgression,
};
pub use deferred::{DeferredActivation, GateState};
pub use error::{OrchestratorError, OrchestratorResult};
pub use orchestrator::Orchestrator;
