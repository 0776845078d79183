//! Lifecycle notifications emitted while an action runs.
//!
//! Every resource instance produces exactly one `Started` event followed by one
//! `Finished` event. Events for different instances interleave freely.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ActionKind, ResourceInstance};

/// Final status of one action invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionStatus {
    /// The action returned successfully.
    Succeeded,
    /// The action returned an error.
    Failed { message: String },
    /// The action did not finish within the configured timeout.
    TimedOut { timeout_ms: u64 },
}

impl ActionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ActionStatus::Succeeded)
    }
}

/// Phase of an action event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ActionEventKind {
    Started,
    Finished {
        #[serde(flatten)]
        status: ActionStatus,
    },
}

/// A progress notification for a single resource instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionEvent {
    /// Action being applied.
    pub action: ActionKind,
    /// Owning service.
    pub service: String,
    /// Identifier of the instance.
    pub resource_id: String,
    /// Display name of the instance (see [`ResourceInstance::progress_name`]).
    pub resource_name: String,
    /// Started or finished, with the final status.
    pub kind: ActionEventKind,
    /// When the event was produced.
    pub at: DateTime<Utc>,
}

impl ActionEvent {
    /// Event emitted right before the action is invoked.
    pub fn started(action: ActionKind, resource: &ResourceInstance) -> Self {
        Self::new(action, resource, ActionEventKind::Started)
    }

    /// Event emitted right after the action returns (or times out).
    pub fn finished(action: ActionKind, resource: &ResourceInstance, status: ActionStatus) -> Self {
        Self::new(action, resource, ActionEventKind::Finished { status })
    }

    fn new(action: ActionKind, resource: &ResourceInstance, kind: ActionEventKind) -> Self {
        Self {
            action,
            service: resource.service.clone(),
            resource_id: resource.id.clone(),
            resource_name: resource.progress_name(),
            kind,
            at: Utc::now(),
        }
    }

    /// Short progress text such as `Restarting`, `Restarted`, or `Error`.
    pub fn label(&self) -> &'static str {
        match &self.kind {
            ActionEventKind::Started => self.action.in_progress_label(),
            ActionEventKind::Finished {
                status: ActionStatus::Succeeded,
            } => self.action.done_label(),
            ActionEventKind::Finished { .. } => "Error",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.kind, ActionEventKind::Finished { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_follow_action_and_status() {
        let resource = ResourceInstance::replica("shop", "web", 1);
        let started = ActionEvent::started(ActionKind::Restart, &resource);
        assert_eq!(started.label(), "Restarting");
        assert_eq!(started.resource_name, "Container shop-web-1");

        let done = ActionEvent::finished(ActionKind::Restart, &resource, ActionStatus::Succeeded);
        assert_eq!(done.label(), "Restarted");

        let failed = ActionEvent::finished(
            ActionKind::Stop,
            &resource,
            ActionStatus::Failed {
                message: "boom".into(),
            },
        );
        assert_eq!(failed.label(), "Error");
        assert!(failed.is_finished());
    }

    #[test]
    fn finished_event_serializes_flat_status() {
        let resource = ResourceInstance::replica("shop", "db", 1);
        let event = ActionEvent::finished(ActionKind::Start, &resource, ActionStatus::TimedOut { timeout_ms: 500 });
        let value = serde_json::to_value(&event).expect("serialize event");
        assert_eq!(value["kind"]["phase"], "finished");
        assert_eq!(value["kind"]["status"], "timed_out");
        assert_eq!(value["kind"]["timeout_ms"], 500);
    }
}
