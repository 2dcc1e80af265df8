//! Unit tests for the resilience components
//!
//! Timing-sensitive behaviour runs against `ManualClock` or `MockClock` so
//! backoff delays are asserted exactly instead of measured.

pub mod wrapper;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Shared invocation counter for scripted operations
#[derive(Clone, Default)]
pub struct CallCounter(Arc<AtomicU32>);

impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one invocation and return its 1-based index
    pub fn hit(&self) -> u32 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn count(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}
