//! Per-service fan-out.
//!
//! Applies the action to every instance of one service concurrently. The first
//! failure cancels the shared token so siblings (and, when the token belongs
//! to a wave, every other service of that wave) can stop early. Nothing is
//! aborted: every dispatched task is awaited and reports its own outcome.

use std::{sync::Arc, time::Duration, time::Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use convoy_types::{ActionEvent, ActionKind, ActionStatus, ResourceInstance};

use crate::{
    action::{ActionContext, ResourceAction},
    error::{EngineError, FailureCause},
    outcome::{ActionOutcome, FailureSlot},
    reporter::EventReporter,
};

/// Everything a fan-out needs besides the instances themselves.
#[derive(Clone)]
pub struct FanOut {
    pub action_kind: ActionKind,
    pub timeout: Option<Duration>,
    pub action: Arc<dyn ResourceAction>,
    pub reporter: Arc<dyn EventReporter>,
    /// Cancelled on the first failure; shared by every task of the wave.
    pub cancellation: CancellationToken,
    /// Caller-owned run token; the wave token is its child.
    pub run_cancellation: CancellationToken,
    /// Run-wide first-error slot.
    pub run_failure: Arc<FailureSlot>,
}

/// Outcome of one service's fan-out.
#[derive(Debug, Clone)]
pub struct ServiceOutcome {
    pub service: String,
    pub outcomes: Vec<ActionOutcome>,
    /// First error among this service's instances.
    pub error: Option<EngineError>,
}

impl ServiceOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

impl FanOut {
    /// Applies the action to every instance of `service` and waits for all of them.
    pub async fn run(&self, service: &str, resources: Vec<ResourceInstance>) -> ServiceOutcome {
        if resources.is_empty() {
            debug!(service, "service owns no instances; nothing to do");
            return ServiceOutcome {
                service: service.to_string(),
                outcomes: Vec::new(),
                error: None,
            };
        }

        let service_failure = Arc::new(FailureSlot::new());
        let mut handles: Vec<(ResourceInstance, JoinHandle<ActionOutcome>)> = Vec::with_capacity(resources.len());
        for resource in resources {
            let task = InstanceTask {
                context: ActionContext::new(self.action_kind, service, self.timeout, self.cancellation.clone()),
                action: Arc::clone(&self.action),
                reporter: Arc::clone(&self.reporter),
                service_failure: Arc::clone(&service_failure),
                run_failure: Arc::clone(&self.run_failure),
                run_cancellation: self.run_cancellation.clone(),
                resource: resource.clone(),
            };
            debug!(service, resource = %resource.name, action = %self.action_kind, "dispatching action");
            handles.push((resource, tokio::spawn(task.run())));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (resource, handle) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(join_error) => {
                    let cause = FailureCause::Panicked(join_error.to_string());
                    let status = ActionStatus::Failed {
                        message: cause.to_string(),
                    };
                    self.reporter.report(ActionEvent::finished(self.action_kind, &resource, status.clone()));
                    let error = EngineError::action_failure(service, resource.name.clone(), cause);
                    service_failure.record(error.clone());
                    self.run_failure.record(run_error(error, &self.run_cancellation));
                    self.cancellation.cancel();
                    outcomes.push(ActionOutcome {
                        service: service.to_string(),
                        resource_id: resource.id.clone(),
                        resource_name: resource.name.clone(),
                        status,
                        duration_ms: 0,
                    });
                }
            }
        }

        ServiceOutcome {
            service: service.to_string(),
            outcomes,
            error: service_failure.take(),
        }
    }
}

struct InstanceTask {
    context: ActionContext,
    action: Arc<dyn ResourceAction>,
    reporter: Arc<dyn EventReporter>,
    service_failure: Arc<FailureSlot>,
    run_failure: Arc<FailureSlot>,
    run_cancellation: CancellationToken,
    resource: ResourceInstance,
}

/// Failures observed after the caller cancelled the run surface as [`EngineError::Cancelled`].
fn run_error(error: EngineError, run_cancellation: &CancellationToken) -> EngineError {
    if run_cancellation.is_cancelled() { EngineError::Cancelled } else { error }
}

impl InstanceTask {
    async fn run(self) -> ActionOutcome {
        let Self {
            context,
            action,
            reporter,
            service_failure,
            run_failure,
            run_cancellation,
            resource,
        } = self;

        reporter.report(ActionEvent::started(context.action, &resource));
        let started_at = Instant::now();

        let result = match context.timeout {
            Some(limit) => match tokio::time::timeout(limit, action.apply(&context, &resource)).await {
                Ok(applied) => applied.map_err(|error| FailureCause::Action(format!("{error:#}"))),
                Err(_) => Err(FailureCause::TimedOut(limit)),
            },
            None => action
                .apply(&context, &resource)
                .await
                .map_err(|error| FailureCause::Action(format!("{error:#}"))),
        };

        let duration_ms = started_at.elapsed().as_millis().try_into().unwrap_or(u64::MAX);
        let status = match &result {
            Ok(()) => ActionStatus::Succeeded,
            Err(FailureCause::TimedOut(limit)) => ActionStatus::TimedOut {
                timeout_ms: limit.as_millis().try_into().unwrap_or(u64::MAX),
            },
            Err(cause) => ActionStatus::Failed {
                message: cause.to_string(),
            },
        };
        reporter.report(ActionEvent::finished(context.action, &resource, status.clone()));

        if let Err(cause) = result {
            let error = EngineError::action_failure(context.service.clone(), resource.name.clone(), cause);
            service_failure.record(error.clone());
            if run_failure.record(run_error(error, &run_cancellation)) {
                warn!(service = %context.service, resource = %resource.name, "first failure; cancelling remaining actions");
            } else {
                debug!(service = %context.service, resource = %resource.name, "additional failure suppressed");
            }
            context.cancellation_token().cancel();
        } else {
            debug!(service = %context.service, resource = %resource.name, duration_ms, "action completed");
        }

        ActionOutcome {
            service: context.service,
            resource_id: resource.id,
            resource_name: resource.name,
            status,
            duration_ms,
        }
    }
}
