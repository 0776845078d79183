//! Error types surfaced by the engine.

use std::time::Duration;

use thiserror::Error;

/// Resource name used when a whole service task fails rather than one instance.
pub const SERVICE_TASK_RESOURCE: &str = "all instances";

/// Main error type for a dependency-ordered run.
///
/// Structural variants (`InvalidGraph`, `UnknownService`, `CyclicDependency`,
/// `Discovery`) are raised before any action is invoked. `ActionFailure` is
/// raised after some actions may already have been applied.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid dependency graph: {reason}")]
    InvalidGraph { reason: String },

    #[error("no such service: {name}")]
    UnknownService { name: String },

    #[error("dependency cycle detected involving: {}", services.join(", "))]
    CyclicDependency { services: Vec<String> },

    #[error("service '{service}' failed on '{resource}': {cause}")]
    ActionFailure {
        service: String,
        resource: String,
        cause: FailureCause,
    },

    #[error("resource discovery failed: {message}")]
    Discovery { message: String },

    #[error("run cancelled before completion")]
    Cancelled,
}

/// Why a single action invocation failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FailureCause {
    #[error("{0}")]
    Action(String),

    #[error("timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),

    #[error("action task panicked: {0}")]
    Panicked(String),
}

impl EngineError {
    /// Create an invalid graph error.
    pub fn invalid_graph(reason: impl Into<String>) -> Self {
        Self::InvalidGraph { reason: reason.into() }
    }

    /// Create an unknown service error.
    pub fn unknown_service(name: impl Into<String>) -> Self {
        Self::UnknownService { name: name.into() }
    }

    /// Create an action failure for one resource instance.
    pub fn action_failure(service: impl Into<String>, resource: impl Into<String>, cause: FailureCause) -> Self {
        Self::ActionFailure {
            service: service.into(),
            resource: resource.into(),
            cause,
        }
    }

    /// Create a failure for a service task that died before reporting per-instance outcomes.
    pub fn service_task_failure(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::action_failure(service, SERVICE_TASK_RESOURCE, FailureCause::Panicked(message.into()))
    }

    /// Whether the error was raised before any action could run.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::InvalidGraph { .. } | Self::UnknownService { .. } | Self::CyclicDependency { .. } | Self::Discovery { .. }
        )
    }

    /// Name of the failing service, for action failures.
    pub fn failed_service(&self) -> Option<&str> {
        match self {
            Self::ActionFailure { service, .. } => Some(service),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_failure_message_names_service_and_resource() {
        let error = EngineError::action_failure("web", "shop-web-2", FailureCause::TimedOut(Duration::from_millis(250)));
        assert_eq!(error.to_string(), "service 'web' failed on 'shop-web-2': timed out after 250ms");
        assert_eq!(error.failed_service(), Some("web"));
        assert!(!error.is_structural());
    }

    #[test]
    fn service_task_failure_does_not_repeat_service_name() {
        let error = EngineError::service_task_failure("web", "task 7 panicked");
        assert_eq!(error.to_string(), "service 'web' failed on 'all instances': action task panicked: task 7 panicked");
        assert_eq!(error.failed_service(), Some("web"));
    }

    #[test]
    fn cycle_message_lists_services() {
        let error = EngineError::CyclicDependency {
            services: vec!["a".into(), "b".into()],
        };
        assert_eq!(error.to_string(), "dependency cycle detected involving: a, b");
        assert!(error.is_structural());
    }
}
