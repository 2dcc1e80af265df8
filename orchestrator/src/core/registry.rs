//! Call registry
//!
//! Records named calls with a priority bucket and dependency ids, tracks their
//! resolution, and answers whether a call's prerequisites are satisfied.
//! Gating is bucket-level: a dependency only counts once the whole bucket
//! containing it has crossed the completion threshold.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use shared::Priority;

use crate::error::{OrchestratorError, OrchestratorResult};

/// Resolution status of a registered call. `Resolved` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// Registered, not yet started
    Idle,
    /// In flight
    Pending,
    Resolved,
    Failed,
}

impl Resolution {
    /// Success and failure both count toward bucket completion
    pub fn is_resolved(self) -> bool {
        matches!(self, Resolution::Resolved | Resolution::Failed)
    }
}

/// Call-site view of the lifecycle:
/// `Unregistered → Registered → {Enabled | Blocked} → Pending → {Resolved | Failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallPhase {
    Unregistered,
    Blocked,
    Enabled,
    Pending,
    Resolved,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallDescriptor {
    pub id: String,
    pub priority: Priority,
    pub dependencies: BTreeSet<String>,
}

#[derive(Debug, Clone)]
struct RegisteredCall {
    descriptor: CallDescriptor,
    resolution: Resolution,
}

/// Resolved/total counts for one bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketProgress {
    pub priority: Priority,
    pub resolved: usize,
    pub total: usize,
    pub progress: f64,
    pub complete: bool,
}

pub struct CallRegistry {
    calls: HashMap<String, RegisteredCall>,
    /// Percentage at which a bucket counts as complete
    threshold: f64,
}

impl CallRegistry {
    pub fn new(threshold: f64) -> Self {
        Self {
            calls: HashMap::new(),
            threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Register a call. Re-registering an existing id is a no-op; returns whether it was new.
    pub fn register_call<I, S>(&mut self, id: &str, priority: Priority, dependencies: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.calls.contains_key(id) {
            return false;
        }

        let descriptor = CallDescriptor {
            id: id.to_string(),
            priority,
            dependencies: dependencies.into_iter().map(Into::into).collect(),
        };
        self.calls.insert(
            id.to_string(),
            RegisteredCall {
                descriptor,
                resolution: Resolution::Idle,
            },
        );
        true
    }

    pub fn descriptor(&self, id: &str) -> Option<&CallDescriptor> {
        self.calls.get(id).map(|call| &call.descriptor)
    }

    pub fn resolution(&self, id: &str) -> Option<Resolution> {
        self.calls.get(id).map(|call| call.resolution)
    }

    pub fn mark_pending(&mut self, id: &str) -> OrchestratorResult<bool> {
        self.transition(id, Resolution::Pending)
    }

    pub fn mark_resolved(&mut self, id: &str) -> OrchestratorResult<bool> {
        self.transition(id, Resolution::Resolved)
    }

    pub fn mark_failed(&mut self, id: &str) -> OrchestratorResult<bool> {
        self.transition(id, Resolution::Failed)
    }

    /// Apply a transition unless the call is already terminal; returns whether anything changed
    fn transition(&mut self, id: &str, next: Resolution) -> OrchestratorResult<bool> {
        let call = self
            .calls
            .get_mut(id)
            .ok_or_else(|| OrchestratorError::UnknownCall { id: id.to_string() })?;

        if call.resolution.is_resolved() || call.resolution == next {
            return Ok(false);
        }
        call.resolution = next;
        Ok(true)
    }

    /// Critical calls are always enabled. Anything else is enabled once every
    /// dependency's bucket has reached the threshold. Unknown calls and
    /// unknown dependencies are never enabled.
    pub fn is_call_enabled(&self, id: &str) -> bool {
        let Some(call) = self.calls.get(id) else {
            return false;
        };
        if call.descriptor.priority == Priority::Critical {
            return true;
        }

        call.descriptor.dependencies.iter().all(|dependency| {
            self.calls
                .get(dependency)
                .is_some_and(|dep| self.is_stage_complete(dep.descriptor.priority))
        })
    }

    pub fn call_phase(&self, id: &str) -> CallPhase {
        match self.resolution(id) {
            None => CallPhase::Unregistered,
            Some(Resolution::Pending) => CallPhase::Pending,
            Some(Resolution::Resolved) => CallPhase::Resolved,
            Some(Resolution::Failed) => CallPhase::Failed,
            Some(Resolution::Idle) if self.is_call_enabled(id) => CallPhase::Enabled,
            Some(Resolution::Idle) => CallPhase::Blocked,
        }
    }

    /// (resolved, total) for `bucket`
    pub fn bucket_counts(&self, bucket: Priority) -> (usize, usize) {
        self.calls
            .values()
            .filter(|call| call.descriptor.priority == bucket)
            .fold((0, 0), |(resolved, total), call| {
                let resolved_now = usize::from(call.resolution.is_resolved());
                (resolved + resolved_now, total + 1)
            })
    }

    /// Percentage of `bucket` resolved. An empty bucket is fully drained.
    pub fn stage_progress(&self, bucket: Priority) -> f64 {
        match self.bucket_counts(bucket) {
            (_, 0) => 100.0,
            (resolved, total) => resolved as f64 / total as f64 * 100.0,
        }
    }

    /// Compared as `resolved * 100 >= threshold * total` so an exactly met
    /// threshold is never lost to division rounding
    pub fn is_stage_complete(&self, bucket: Priority) -> bool {
        let (resolved, total) = self.bucket_counts(bucket);
        total == 0 || resolved as f64 * 100.0 >= self.threshold * total as f64
    }

    pub fn bucket_progress(&self, bucket: Priority) -> BucketProgress {
        let (resolved, total) = self.bucket_counts(bucket);
        BucketProgress {
            priority: bucket,
            resolved,
            total,
            progress: self.stage_progress(bucket),
            complete: self.is_stage_complete(bucket),
        }
    }

    /// Percentage of all registered calls resolved; 0 before anything is registered
    pub fn overall_progress(&self) -> f64 {
        if self.calls.is_empty() {
            return 0.0;
        }
        let resolved = self
            .calls
            .values()
            .filter(|call| call.resolution.is_resolved())
            .count();
        resolved as f64 / self.calls.len() as f64 * 100.0
    }

    /// Registered ids, sorted for stable output
    pub fn call_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.calls.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}
