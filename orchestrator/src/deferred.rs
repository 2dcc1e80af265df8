//! Deferred activation gate
//!
//! Holds a deferrable query back for a short fixed delay measured from the
//! moment deferral is requested. Turning deferral off activates at once and
//! cancels the timer; teardown cancels unconditionally so a gate that never
//! fired stays inert.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::watch;

use shared::{Clock, TimerCallback, TimerHandle};

use crate::error::{OrchestratorError, OrchestratorResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GateState {
    Idle,
    Waiting,
    Active,
    TornDown,
}

struct GateInner {
    state: GateState,
    timer: Option<TimerHandle>,
    callbacks: Vec<TimerCallback>,
}

struct GateShared {
    inner: Mutex<GateInner>,
    tx: watch::Sender<GateState>,
}

impl GateShared {
    fn lock(&self) -> MutexGuard<'_, GateInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Move to Active from Idle or Waiting, then run callbacks outside the lock
    fn activate(&self) -> bool {
        let callbacks = {
            let mut inner = self.lock();
            if !matches!(inner.state, GateState::Idle | GateState::Waiting) {
                return false;
            }
            if let Some(timer) = inner.timer.take() {
                timer.cancel();
            }
            self.publish(&mut inner, GateState::Active);
            std::mem::take(&mut inner.callbacks)
        };

        for callback in callbacks {
            callback();
        }
        true
    }

    /// Set `state` and publish it under the same lock so watchers never see a stale value
    fn publish(&self, inner: &mut GateInner, state: GateState) {
        inner.state = state;
        self.tx.send_replace(state);
    }

    /// Timer path: only a gate still waiting may fire
    fn fire(&self) {
        if self.lock().state == GateState::Waiting {
            self.activate();
        }
    }
}

/// Cloneable handle; clones share one gate
#[derive(Clone)]
pub struct DeferredActivation {
    clock: Arc<dyn Clock>,
    delay: Duration,
    shared: Arc<GateShared>,
}

impl DeferredActivation {
    pub fn new(clock: Arc<dyn Clock>, delay: Duration) -> Self {
        let (tx, _) = watch::channel(GateState::Idle);
        Self {
            clock,
            delay,
            shared: Arc::new(GateShared {
                inner: Mutex::new(GateInner {
                    state: GateState::Idle,
                    timer: None,
                    callbacks: Vec::new(),
                }),
                tx,
            }),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn state(&self) -> GateState {
        self.shared.lock().state
    }

    pub fn is_active(&self) -> bool {
        self.state() == GateState::Active
    }

    /// Arm the timer. No-op unless the gate is idle.
    pub fn defer(&self) {
        let mut inner = self.shared.lock();
        if inner.state != GateState::Idle {
            return;
        }

        let weak: Weak<GateShared> = Arc::downgrade(&self.shared);
        self.shared.publish(&mut inner, GateState::Waiting);
        // The clock may fire synchronously on a later advance, never inside schedule
        inner.timer = Some(self.clock.schedule(
            self.delay,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.fire();
                }
            }),
        ));
        drop(inner);

        tracing::debug!(delay_ms = self.delay.as_millis() as u64, "deferred activation armed");
    }

    /// `true` behaves like [`defer`](Self::defer); `false` activates immediately
    pub fn set_deferred(&self, deferred: bool) {
        if deferred {
            self.defer();
        } else if self.shared.activate() {
            tracing::debug!("deferral lifted, activated immediately");
        }
    }

    /// Run `callback` once on activation, or right away if already active.
    /// Dropped without running if the gate is torn down.
    pub fn on_activate<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut inner = self.shared.lock();
        match inner.state {
            GateState::Active => {
                drop(inner);
                callback();
            }
            GateState::TornDown => {}
            GateState::Idle | GateState::Waiting => inner.callbacks.push(Box::new(callback)),
        }
    }

    /// Wait until the gate activates
    pub async fn activated(&self) -> OrchestratorResult<()> {
        let mut rx = self.shared.tx.subscribe();
        loop {
            let state = *rx.borrow_and_update();
            match state {
                GateState::Active => return Ok(()),
                GateState::TornDown => return Err(OrchestratorError::SessionClosed),
                GateState::Idle | GateState::Waiting => {}
            }
            if rx.changed().await.is_err() {
                return Err(OrchestratorError::SessionClosed);
            }
        }
    }

    /// Cancel any pending timer and drop queued callbacks. An active gate stays active.
    pub fn teardown(&self) {
        let mut inner = self.shared.lock();
        if let Some(timer) = inner.timer.take() {
            timer.cancel();
        }
        inner.callbacks.clear();
        if inner.state != GateState::Active {
            self.shared.publish(&mut inner, GateState::TornDown);
        }
    }
}
