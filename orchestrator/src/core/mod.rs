//! Core scheduling logic
//!
//! The registry and stage progression are synchronous and deterministic;
//! the orchestrator wraps them behind a session handle.

pub mod registry;
pub mod stage;
pub mod state;

pub use registry::{BucketProgress, CallDescriptor, CallPhase, CallRegistry, Resolution};
pub use stage::StageProgression;
pub use state::{CallSnapshot, SessionSnapshot, SessionState};
