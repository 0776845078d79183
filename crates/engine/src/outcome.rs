//! Result aggregation.
//!
//! Failures are collected into a first-error-wins slot; every per-instance
//! outcome is kept in the [`RunReport`] regardless.

use std::sync::Mutex;

use indexmap::IndexMap;
use serde::Serialize;

use convoy_types::{ActionKind, ActionStatus, ExecutionDirection};

use crate::error::EngineError;

/// Holds the first recorded failure. Later writes are no-ops.
#[derive(Debug, Default)]
pub struct FailureSlot {
    first: Mutex<Option<EngineError>>,
}

impl FailureSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `error` if no failure has been recorded yet.
    ///
    /// Returns `true` when this call won.
    pub fn record(&self, error: EngineError) -> bool {
        let mut first = self.first.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if first.is_some() {
            return false;
        }
        *first = Some(error);
        true
    }

    pub fn is_set(&self) -> bool {
        self.first.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).is_some()
    }

    /// Removes and returns the recorded failure.
    pub fn take(&self) -> Option<EngineError> {
        self.first.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take()
    }
}

/// Result of applying the action to one resource instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub service: String,
    pub resource_id: String,
    pub resource_name: String,
    pub status: ActionStatus,
    pub duration_ms: u64,
}

/// Lifecycle of a service within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// Waiting on at least one blocker.
    Pending,
    /// Every blocker is done; selected for the next wave.
    Runnable,
    /// Fan-out in progress.
    Running,
    /// Every instance succeeded.
    Done,
    /// At least one instance failed.
    Failed,
}

/// Aggregate outcome of a run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Action that was applied.
    pub action: ActionKind,
    /// Traversal direction used.
    pub direction: ExecutionDirection,
    /// Waves that were started, in order.
    pub waves: Vec<Vec<String>>,
    /// Final state of every in-scope service.
    pub states: IndexMap<String, NodeState>,
    /// Per-instance outcomes, in completion order within each wave.
    pub outcomes: Vec<ActionOutcome>,
    /// The single failure surfaced for the run.
    pub failure: Option<EngineError>,
}

impl RunReport {
    pub fn new(action: ActionKind, direction: ExecutionDirection) -> Self {
        Self {
            action,
            direction,
            waves: Vec::new(),
            states: IndexMap::new(),
            outcomes: Vec::new(),
            failure: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Converts the report into the run's overall result.
    pub fn into_result(mut self) -> Result<Self, EngineError> {
        match self.failure.take() {
            Some(error) => Err(error),
            None => Ok(self),
        }
    }

    /// Final state of `service`, if it was in scope.
    pub fn state_of(&self, service: &str) -> Option<NodeState> {
        self.states.get(service).copied()
    }

    /// Services that never started, e.g. because an earlier wave failed.
    pub fn not_started(&self) -> Vec<&str> {
        self.states
            .iter()
            .filter(|(_, state)| matches!(state, NodeState::Pending | NodeState::Runnable))
            .map(|(service, _)| service.as_str())
            .collect()
    }

    /// Counts of `(succeeded, failed)` instance outcomes.
    pub fn tally(&self) -> (usize, usize) {
        let succeeded = self.outcomes.iter().filter(|outcome| outcome.status.is_success()).count();
        (succeeded, self.outcomes.len() - succeeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_slot_keeps_first_error() {
        let slot = FailureSlot::new();
        assert!(slot.record(EngineError::unknown_service("first")));
        assert!(!slot.record(EngineError::unknown_service("second")));
        assert!(slot.is_set());
        assert_eq!(slot.take(), Some(EngineError::unknown_service("first")));
        assert!(!slot.is_set());
    }

    #[test]
    fn report_surfaces_failure_as_error() {
        let mut report = RunReport::new(ActionKind::Restart, ExecutionDirection::DependenciesFirst);
        report.states.insert("db".into(), NodeState::Done);
        report.states.insert("web".into(), NodeState::Pending);
        assert_eq!(report.not_started(), vec!["web"]);

        report.failure = Some(EngineError::Cancelled);
        assert!(!report.is_success());
        assert_eq!(report.into_result().expect_err("failed run"), EngineError::Cancelled);
    }
}
