//! # Convoy Engine
//!
//! Applies a lifecycle action (start, stop, restart) to every resource
//! instance of a set of services, honoring the dependency edges between them.
//!
//! ## Key Features
//!
//! - **Topological execution**: services run in waves; a wave starts only after the previous one finished
//! - **Fan-out**: every instance of a service is handled concurrently
//! - **Fail-fast**: the first failure cancels the rest of its wave and no further wave starts
//! - **Partial scope**: an explicit list of services may be targeted; the others count as complete
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use convoy_engine::{Collaborators, NoopAction, NoopReporter, RunOptions, StaticInventory, run_in_dependency_order};
//! use convoy_types::{ActionKind, DependencyRule, ProjectDefinition, ServiceDefinition};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let project = ProjectDefinition::new("shop")
//!     .with_service(ServiceDefinition::new("db"))
//!     .with_service(ServiceDefinition::new("web").depends_on("db", DependencyRule::restarting()));
//!
//! let collaborators = Collaborators::new(
//!     Arc::new(StaticInventory::from_project("shop", &project)),
//!     Arc::new(NoopAction),
//!     Arc::new(NoopReporter),
//! );
//! let report = run_in_dependency_order(&project, &RunOptions::new(ActionKind::Restart), &collaborators)
//!     .await
//!     .expect("run succeeds");
//! assert_eq!(report.waves, vec![vec!["db".to_string()], vec!["web".to_string()]]);
//! # });
//! ```
//!
//! ## Architecture
//!
//! - **`graph`**: immutable dependency graph of propagating edges
//! - **`scope`**: resolution of the services selected for a run
//! - **`scheduler`**: wave planning and execution
//! - **`fanout`**: concurrent per-instance execution with first-error cancellation
//! - **`outcome`**: first-error slot and the run report
//! - **`run`**: end-to-end orchestration over the external collaborators

pub mod action;
pub mod config;
pub mod error;
pub mod fanout;
pub mod graph;
pub mod inventory;
pub mod outcome;
pub mod project;
pub mod reporter;
pub mod run;
pub mod scheduler;
pub mod scope;

// Re-export commonly used types for convenience
pub use action::{ActionContext, FnAction, NoopAction, ResourceAction};
pub use config::{RunOptions, default_project_path};
pub use error::{EngineError, FailureCause};
pub use graph::{DependencyEdge, DependencyGraph, ServiceNode};
pub use inventory::{ResourceInventory, ResourceMap, StaticInventory};
pub use outcome::{ActionOutcome, NodeState, RunReport};
pub use project::{load_project_file, project_name};
pub use reporter::{ChannelReporter, CollectingReporter, EventReporter, NoopReporter, TracingReporter};
pub use run::{Collaborators, plan_run, run_in_dependency_order, run_with_cancellation};
pub use scheduler::{Scheduler, WavePlan, plan_waves};
pub use scope::ExecutionScope;
