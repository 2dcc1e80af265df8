//! Test helpers and builder patterns for orchestrator tests

use std::sync::Arc;

use orchestrator::{CallPhase, Orchestrator};
use resilience::ResilientCallWrapper;
use shared::{ManualClock, Priority, ResilienceSettings, ServiceError};

use super::fixtures::TestFixtures;

/// Builder for orchestrators on a virtual clock
pub struct OrchestratorBuilder {
    clock: ManualClock,
    settings: ResilienceSettings,
    calls: Vec<(String, Priority, Vec<String>)>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            clock: ManualClock::new(),
            settings: TestFixtures::settings(),
            calls: Vec::new(),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.settings.stage_threshold = threshold;
        self
    }

    pub fn with_call(mut self, id: &str, priority: Priority, dependencies: &[&str]) -> Self {
        self.calls.push((
            id.to_string(),
            priority,
            dependencies.iter().map(|d| d.to_string()).collect(),
        ));
        self
    }

    pub fn with_abc_chain(self) -> Self {
        TestFixtures::abc_chain()
            .into_iter()
            .fold(self, |builder, (id, priority, deps)| builder.with_call(id, priority, &deps))
    }

    /// Build and register every queued call
    pub async fn build(self) -> (Orchestrator, ManualClock) {
        let orchestrator = Orchestrator::with_settings(Arc::new(self.clock.clone()), self.settings);
        for (id, priority, deps) in self.calls {
            orchestrator.register_call(&id, priority, deps).await;
        }
        (orchestrator, self.clock)
    }
}

pub struct TestHelpers;

impl TestHelpers {
    /// Wrapper sharing the orchestrator's clock and settings
    pub fn wrapper<T: Clone + Send + 'static>(
        orchestrator: &Orchestrator,
    ) -> ResilientCallWrapper<T> {
        ResilientCallWrapper::from_settings(
            TestFixtures::SERVICE,
            orchestrator.clock(),
            orchestrator.settings(),
        )
    }

    pub async fn resolve(orchestrator: &Orchestrator, id: &str) {
        let result = orchestrator.run_call(id, async { Ok::<_, ServiceError>(()) }).await;
        assert!(result.is_ok(), "{id} should run: {result:?}");
    }

    pub async fn fail(orchestrator: &Orchestrator, id: &str) {
        let result = orchestrator
            .run_call(id, async { Err::<(), _>(ServiceError::network("down")) })
            .await;
        assert!(result.is_err());
    }

    pub async fn assert_phases(orchestrator: &Orchestrator, expected: &[(&str, CallPhase)]) {
        for (id, phase) in expected {
            assert_eq!(orchestrator.call_phase(id).await, *phase, "phase of {id}");
        }
    }
}
