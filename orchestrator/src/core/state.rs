//! Per-session state
//!
//! Owns the call registry, stage progression and the deferred gates created
//! for the session. Every resolution change recomputes the stage.

use serde::Serialize;
use std::collections::BTreeSet;
use tokio::sync::watch;

use shared::{session_debug, session_info, Priority, SessionId, Stage};

use super::registry::{BucketProgress, CallPhase, CallRegistry, Resolution};
use super::stage::StageProgression;
use crate::deferred::{DeferredActivation, GateState};
use crate::error::OrchestratorResult;

/// Serializable progress report for one session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub stage: Stage,
    pub overall_progress: f64,
    pub buckets: Vec<BucketProgress>,
    pub calls: Vec<CallSnapshot>,
    pub torn_down: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSnapshot {
    pub id: String,
    pub priority: Priority,
    pub phase: CallPhase,
    pub dependencies: BTreeSet<String>,
}

pub struct SessionState {
    session_id: SessionId,
    registry: CallRegistry,
    stage: StageProgression,
    gates: Vec<DeferredActivation>,
    torn_down: bool,
    closed: watch::Sender<bool>,
}

impl SessionState {
    pub fn new(session_id: SessionId, threshold: f64) -> Self {
        Self {
            session_id,
            registry: CallRegistry::new(threshold),
            stage: StageProgression::new(),
            gates: Vec::new(),
            torn_down: false,
            closed: watch::channel(false).0,
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn registry(&self) -> &CallRegistry {
        &self.registry
    }

    pub fn current_stage(&self) -> Stage {
        self.stage.current()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn register_call(
        &mut self,
        id: &str,
        priority: Priority,
        dependencies: Vec<String>,
    ) -> bool {
        if self.torn_down {
            session_debug!(self.session_id, call = id, "ignoring registration after teardown");
            return false;
        }

        let added = self.registry.register_call(id, priority, dependencies);
        if added {
            session_debug!(
                self.session_id,
                call = id,
                priority = %priority,
                "📋 call registered"
            );
            self.advance_stage();
        }
        added
    }

    /// Apply a resolution change. Ignored once the session is torn down.
    pub fn apply(&mut self, id: &str, next: Resolution) -> OrchestratorResult<bool> {
        if self.torn_down {
            session_debug!(
                self.session_id,
                call = id,
                ?next,
                "ignoring late transition after teardown"
            );
            return Ok(false);
        }

        let changed = match next {
            Resolution::Idle => false,
            Resolution::Pending => self.registry.mark_pending(id)?,
            Resolution::Resolved => self.registry.mark_resolved(id)?,
            Resolution::Failed => self.registry.mark_failed(id)?,
        };

        if changed {
            session_debug!(self.session_id, call = id, ?next, "call transitioned");
            self.advance_stage();
        }
        Ok(changed)
    }

    /// Receiver that flips to `true` when the session is torn down
    pub fn subscribe_closed(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }

    /// Track `gate` for teardown. Gates that already activated are released.
    pub fn track_gate(&mut self, gate: DeferredActivation) {
        self.gates.retain(|tracked| tracked.state() != GateState::Active);
        self.gates.push(gate);
    }

    pub fn tracked_gates(&self) -> usize {
        self.gates.len()
    }

    /// Mark the session closed and tear down every tracked gate. Returns false if already closed.
    pub fn teardown(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        self.torn_down = true;
        for gate in self.gates.drain(..) {
            gate.teardown();
        }
        self.closed.send_replace(true);
        true
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let calls = self
            .registry
            .call_ids()
            .into_iter()
            .filter_map(|id| {
                self.registry.descriptor(id).map(|descriptor| CallSnapshot {
                    id: id.to_string(),
                    priority: descriptor.priority,
                    phase: self.registry.call_phase(id),
                    dependencies: descriptor.dependencies.clone(),
                })
            })
            .collect();

        SessionSnapshot {
            session_id: self.session_id,
            stage: self.stage.current(),
            overall_progress: self.registry.overall_progress(),
            buckets: Priority::ALL
                .into_iter()
                .map(|bucket| self.registry.bucket_progress(bucket))
                .collect(),
            calls,
            torn_down: self.torn_down,
        }
    }

    fn advance_stage(&mut self) {
        if let Some(stage) = self.stage.advance(&self.registry) {
            session_info!(
                self.session_id,
                stage = %stage,
                progress = self.registry.overall_progress(),
                "📈 stage advanced"
            );
        }
    }
}
