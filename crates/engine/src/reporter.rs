//! Progress reporting sinks.

use std::sync::Mutex;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use convoy_types::{ActionEvent, ActionEventKind, ActionStatus};

/// Receives lifecycle notifications for every resource instance.
///
/// Implementations must be cheap and non-blocking; they are called from the
/// tasks applying the action.
pub trait EventReporter: Send + Sync {
    fn report(&self, event: ActionEvent);
}

/// Discards every event.
pub struct NoopReporter;

impl EventReporter for NoopReporter {
    fn report(&self, _event: ActionEvent) {}
}

/// Forwards events over a Tokio channel. A closed receiver is ignored.
pub struct ChannelReporter {
    event_tx: UnboundedSender<ActionEvent>,
}

impl ChannelReporter {
    pub fn new(event_tx: UnboundedSender<ActionEvent>) -> Self {
        Self { event_tx }
    }
}

impl EventReporter for ChannelReporter {
    fn report(&self, event: ActionEvent) {
        let _ = self.event_tx.send(event);
    }
}

/// Emits each event as a structured tracing record.
pub struct TracingReporter;

impl EventReporter for TracingReporter {
    fn report(&self, event: ActionEvent) {
        match &event.kind {
            ActionEventKind::Started => {
                info!(service = %event.service, resource = %event.resource_name, "{}", event.label())
            }
            ActionEventKind::Finished {
                status: ActionStatus::Succeeded,
            } => info!(service = %event.service, resource = %event.resource_name, "{}", event.label()),
            ActionEventKind::Finished { status } => {
                warn!(service = %event.service, resource = %event.resource_name, status = ?status, "{}", event.label())
            }
        }
    }
}

/// Keeps every event in memory, in arrival order.
#[derive(Default)]
pub struct CollectingReporter {
    events: Mutex<Vec<ActionEvent>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far.
    pub fn events(&self) -> Vec<ActionEvent> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    /// Events for a single resource instance, in arrival order.
    pub fn events_for(&self, resource_id: &str) -> Vec<ActionEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.resource_id == resource_id)
            .collect()
    }
}

impl EventReporter for CollectingReporter {
    fn report(&self, event: ActionEvent) {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convoy_types::{ActionKind, ResourceInstance};
    use tokio::sync::mpsc::unbounded_channel;

    #[test]
    fn channel_reporter_tolerates_closed_receiver() {
        let (event_tx, event_rx) = unbounded_channel();
        drop(event_rx);
        let reporter = ChannelReporter::new(event_tx);
        reporter.report(ActionEvent::started(ActionKind::Start, &ResourceInstance::replica("shop", "db", 1)));
    }

    #[test]
    fn collecting_reporter_filters_by_resource() {
        let reporter = CollectingReporter::new();
        let db = ResourceInstance::replica("shop", "db", 1);
        let web = ResourceInstance::replica("shop", "web", 1);
        reporter.report(ActionEvent::started(ActionKind::Restart, &db));
        reporter.report(ActionEvent::started(ActionKind::Restart, &web));
        reporter.report(ActionEvent::finished(ActionKind::Restart, &db, ActionStatus::Succeeded));

        let db_events = reporter.events_for(&db.id);
        assert_eq!(db_events.len(), 2);
        assert!(!db_events[0].is_finished());
        assert!(db_events[1].is_finished());
        assert_eq!(reporter.events().len(), 3);
    }
}
