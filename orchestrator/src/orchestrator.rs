//! Per-session orchestrator
//!
//! One `Orchestrator` is constructed per dashboard session and handed to every
//! call site. Clones share the same session state.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

use shared::{
    logging, session_debug, session_info, Clock, Priority, ResilienceSettings, ServiceError,
    SessionId, Stage,
};

use crate::{
    core::{CallPhase, Resolution, SessionSnapshot, SessionState},
    deferred::DeferredActivation,
    error::{OrchestratorError, OrchestratorResult},
};

#[derive(Clone)]
pub struct Orchestrator {
    session_id: SessionId,
    clock: Arc<dyn Clock>,
    settings: ResilienceSettings,
    state: Arc<Mutex<SessionState>>,
}

impl Orchestrator {
    /// New session with default settings
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_settings(clock, ResilienceSettings::default())
    }

    pub fn with_settings(clock: Arc<dyn Clock>, settings: ResilienceSettings) -> Self {
        let session_id = SessionId::new();
        logging::log_session_start(&session_id, "dashboard session");

        Self {
            session_id,
            clock,
            state: Arc::new(Mutex::new(SessionState::new(
                session_id,
                settings.stage_threshold,
            ))),
            settings,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn settings(&self) -> &ResilienceSettings {
        &self.settings
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Register a call. Re-registering an id is a no-op; returns whether it was new.
    pub async fn register_call<I, S>(
        &self,
        id: &str,
        priority: Priority,
        dependencies: I,
    ) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let dependencies = dependencies.into_iter().map(Into::into).collect();
        self.state
            .lock()
            .await
            .register_call(id, priority, dependencies)
    }

    pub async fn is_call_enabled(&self, id: &str) -> bool {
        self.state.lock().await.registry().is_call_enabled(id)
    }

    pub async fn call_phase(&self, id: &str) -> CallPhase {
        self.state.lock().await.registry().call_phase(id)
    }

    pub async fn mark_pending(&self, id: &str) -> OrchestratorResult<bool> {
        self.state.lock().await.apply(id, Resolution::Pending)
    }

    pub async fn mark_resolved(&self, id: &str) -> OrchestratorResult<bool> {
        self.state.lock().await.apply(id, Resolution::Resolved)
    }

    pub async fn mark_failed(&self, id: &str) -> OrchestratorResult<bool> {
        self.state.lock().await.apply(id, Resolution::Failed)
    }

    pub async fn current_stage(&self) -> Stage {
        self.state.lock().await.current_stage()
    }

    pub async fn overall_progress(&self) -> f64 {
        self.state.lock().await.registry().overall_progress()
    }

    pub async fn stage_progress(&self, bucket: Priority) -> f64 {
        self.state.lock().await.registry().stage_progress(bucket)
    }

    pub async fn is_stage_complete(&self, bucket: Priority) -> bool {
        self.state.lock().await.registry().is_stage_complete(bucket)
    }

    pub async fn is_critical_ready(&self) -> bool {
        self.is_stage_complete(Priority::Critical).await
    }

    pub async fn is_important_ready(&self) -> bool {
        self.is_stage_complete(Priority::Important).await
    }

    pub async fn is_secondary_ready(&self) -> bool {
        self.is_stage_complete(Priority::Secondary).await
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().await.snapshot()
    }

    /// Drive one registered call: check enablement, mark it pending, await
    /// `operation`, then record the outcome.
    ///
    /// Teardown while `operation` is in flight drops it, which stops any
    /// pending backoff and further attempts, and yields `SessionClosed`.
    pub async fn run_call<T, Fut>(&self, id: &str, operation: Fut) -> OrchestratorResult<T>
    where
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let mut closed = {
            let mut state = self.state.lock().await;
            if state.is_torn_down() {
                return Err(OrchestratorError::SessionClosed);
            }
            match state.registry().call_phase(id) {
                CallPhase::Unregistered => {
                    return Err(OrchestratorError::UnknownCall { id: id.to_string() })
                }
                CallPhase::Blocked => {
                    return Err(OrchestratorError::CallBlocked { id: id.to_string() })
                }
                CallPhase::Pending => {
                    return Err(OrchestratorError::CallInFlight { id: id.to_string() })
                }
                CallPhase::Enabled | CallPhase::Resolved | CallPhase::Failed => {}
            }
            state.apply(id, Resolution::Pending)?;
            state.subscribe_closed()
        };

        // Lock released while the call is in flight
        let outcome = tokio::select! {
            outcome = operation => outcome,
            _ = closed.wait_for(|closed| *closed) => {
                session_debug!(self.session_id, call = id, "call abandoned at teardown");
                return Err(OrchestratorError::SessionClosed);
            }
        };

        let mut state = self.state.lock().await;
        match &outcome {
            Ok(_) => {
                state.apply(id, Resolution::Resolved)?;
            }
            Err(error) => {
                if !state.is_torn_down() {
                    logging::log_error(&self.session_id, id, error);
                }
                state.apply(id, Resolution::Failed)?;
            }
        }
        drop(state);

        outcome.map_err(OrchestratorError::from)
    }

    /// New deferred gate on the session clock, torn down with the session
    pub async fn deferred_gate(&self) -> DeferredActivation {
        let gate = DeferredActivation::new(self.clock.clone(), self.settings.defer_delay());
        let mut state = self.state.lock().await;
        if state.is_torn_down() {
            gate.teardown();
        } else {
            state.track_gate(gate.clone());
        }
        gate
    }

    /// Close the session: cancel pending gates and stop applying results
    pub async fn teardown(&self) {
        let closed = self.state.lock().await.teardown();
        if closed {
            logging::log_teardown(&self.session_id, "session closed");
        } else {
            session_debug!(self.session_id, "teardown requested on closed session");
        }
    }

    pub async fn is_torn_down(&self) -> bool {
        self.state.lock().await.is_torn_down()
    }

    /// Log the current stage and progress
    pub async fn log_progress(&self) {
        let state = self.state.lock().await;
        session_info!(
            self.session_id,
            stage = %state.current_stage(),
            progress = format!("{:.1}%", state.registry().overall_progress()),
            "📊 session progress"
        );
    }
}
