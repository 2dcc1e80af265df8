//! Shared vocabulary for the dashboard request orchestration layer
//!
//! Contains the types every other crate speaks: priority buckets and stages,
//! the normalized service error, the clock abstraction, configuration and
//! session-aware logging.

pub mod clock;
pub mod config;
pub mod errors;
pub mod logging;
pub mod types;

pub use clock::{Clock, ManualClock, MockClock, TimerCallback, TimerHandle, TokioClock};
pub use config::ResilienceSettings;
pub use errors::*;
pub use types::*;
