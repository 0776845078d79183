//! Shared type definitions for Convoy.
//!
//! These models are consumed by the engine, the CLI, and any embedder that
//! supplies its own discovery or action collaborators. They are plain serde
//! structs and enums with no runtime behaviour beyond small helpers.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

pub mod event;
pub mod project;
pub mod resource;

pub use event::{ActionEvent, ActionEventKind, ActionStatus};
pub use project::{DependencyCondition, DependencyRule, ProjectDefinition, ServiceDefinition};
pub use resource::ResourceInstance;

/// The lifecycle action applied to every resource instance of the selected services.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Start stopped instances.
    Start,
    /// Stop running instances.
    Stop,
    /// Restart instances in place.
    #[default]
    Restart,
}

impl ActionKind {
    /// All supported actions, in declaration order.
    pub const ALL: [ActionKind; 3] = [ActionKind::Start, ActionKind::Stop, ActionKind::Restart];

    /// Canonical lowercase name used in project files and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Start => "start",
            ActionKind::Stop => "stop",
            ActionKind::Restart => "restart",
        }
    }

    /// Progress label emitted when the action begins for an instance.
    pub fn in_progress_label(&self) -> &'static str {
        match self {
            ActionKind::Start => "Starting",
            ActionKind::Stop => "Stopping",
            ActionKind::Restart => "Restarting",
        }
    }

    /// Progress label emitted when the action completes successfully.
    pub fn done_label(&self) -> &'static str {
        match self {
            ActionKind::Start => "Started",
            ActionKind::Stop => "Stopped",
            ActionKind::Restart => "Restarted",
        }
    }

    /// Traversal direction used when the caller does not override it.
    ///
    /// Stopping walks dependents first so a service is never left running
    /// against a dependency that has already gone away.
    pub fn default_direction(&self) -> ExecutionDirection {
        match self {
            ActionKind::Stop => ExecutionDirection::DependentsFirst,
            ActionKind::Start | ActionKind::Restart => ExecutionDirection::DependenciesFirst,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(ActionKind::Start),
            "stop" => Ok(ActionKind::Stop),
            "restart" => Ok(ActionKind::Restart),
            other => Err(format!("unsupported action '{other}' (expected start, stop, or restart)")),
        }
    }
}

/// Which side of a dependency edge must finish first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionDirection {
    /// A service runs only after every service it depends on.
    #[default]
    DependenciesFirst,
    /// A service runs only after every service that depends on it.
    DependentsFirst,
}
