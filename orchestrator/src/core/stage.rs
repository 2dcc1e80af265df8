//! Session stage progression
//!
//! Derives a single forward-only stage from bucket completion.

use shared::{Priority, Stage};

use super::registry::CallRegistry;

/// Monotonic stage tracker. Once advanced, never rolled back within a session.
#[derive(Debug, Clone, Default)]
pub struct StageProgression {
    current: Stage,
}

impl StageProgression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Stage {
        self.current
    }

    /// Furthest bucket whose predecessors are all complete, ignoring history
    pub fn compute(registry: &CallRegistry) -> Stage {
        if registry.is_empty() {
            return Stage::Initial;
        }

        let mut stage = Stage::Critical;
        for bucket in Priority::ALL.into_iter().skip(1) {
            match bucket.predecessor() {
                Some(previous) if registry.is_stage_complete(previous) => {
                    stage = Stage::from(bucket)
                }
                _ => break,
            }
        }
        stage
    }

    /// Recompute from `registry`; returns the new stage if it moved forward
    pub fn advance(&mut self, registry: &CallRegistry) -> Option<Stage> {
        let computed = Self::compute(registry);
        if computed > self.current {
            self.current = computed;
            Some(computed)
        } else {
            None
        }
    }
}
