//! Run configuration.

use std::{
    env,
    path::PathBuf,
    time::Duration,
};

use convoy_types::{ActionKind, ExecutionDirection};

/// Environment variable overriding the default project file location.
pub const PROJECT_FILE_ENV: &str = "CONVOY_PROJECT_FILE";

/// File name looked up in the working directory when no override is set.
pub const DEFAULT_PROJECT_FILE: &str = "convoy.yaml";

/// Returns the default path for the project file.
pub fn default_project_path() -> PathBuf {
    if let Ok(path) = env::var(PROJECT_FILE_ENV)
        && !path.trim().is_empty()
    {
        return PathBuf::from(path.trim());
    }

    PathBuf::from(DEFAULT_PROJECT_FILE)
}

/// Options for a single dependency-ordered run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Action applied to every selected instance.
    pub action: ActionKind,
    /// Explicit services to act on. Empty selects every service.
    pub targets: Vec<String>,
    /// Timeout applied to each individual action invocation.
    pub timeout: Option<Duration>,
    /// Overrides the action's default traversal direction.
    pub direction: Option<ExecutionDirection>,
}

impl RunOptions {
    pub fn new(action: ActionKind) -> Self {
        Self {
            action,
            ..Default::default()
        }
    }

    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_direction(mut self, direction: ExecutionDirection) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Direction actually used for the run.
    pub fn effective_direction(&self) -> ExecutionDirection {
        self.direction.unwrap_or_else(|| self.action.default_direction())
    }
}
