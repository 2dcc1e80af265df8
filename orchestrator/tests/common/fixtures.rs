//! Test fixtures and data for orchestrator tests

use std::time::Duration;

use shared::{Priority, ResilienceSettings};

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    pub const SERVICE: &'static str = "dashboard";
    pub const DEFER_DELAY: Duration = Duration::from_millis(50);

    /// Settings with short delays so virtual-time tests read naturally
    pub fn settings() -> ResilienceSettings {
        ResilienceSettings {
            base_delay_ms: 100,
            max_delay_ms: 1_000,
            ..ResilienceSettings::default()
        }
    }

    /// The three-call chain A (critical) → B (important) → C (background)
    pub fn abc_chain() -> Vec<(&'static str, Priority, Vec<&'static str>)> {
        vec![
            ("A", Priority::Critical, vec![]),
            ("B", Priority::Important, vec!["A"]),
            ("C", Priority::Background, vec!["B"]),
        ]
    }

    /// Five critical calls, enough to put the 80% threshold between resolutions
    pub fn critical_batch() -> Vec<String> {
        (1..=5).map(|i| format!("critical-{i}")).collect()
    }
}
