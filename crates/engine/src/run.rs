//! Orchestration of a complete run: scope, graph, discovery, scheduling.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use convoy_types::ProjectDefinition;

use crate::{
    action::ResourceAction,
    config::RunOptions,
    error::EngineError,
    graph::DependencyGraph,
    inventory::{ResourceInventory, group_by_service},
    outcome::RunReport,
    reporter::EventReporter,
    scheduler::{Scheduler, WavePlan},
    scope::ExecutionScope,
};

/// External collaborators used by a run.
#[derive(Clone)]
pub struct Collaborators {
    pub inventory: Arc<dyn ResourceInventory>,
    pub action: Arc<dyn ResourceAction>,
    pub reporter: Arc<dyn EventReporter>,
}

impl Collaborators {
    pub fn new(inventory: Arc<dyn ResourceInventory>, action: Arc<dyn ResourceAction>, reporter: Arc<dyn EventReporter>) -> Self {
        Self {
            inventory,
            action,
            reporter,
        }
    }
}

/// Builds the graph and scope for `options` and validates that they can be ordered.
///
/// This never touches a collaborator, so it is safe for previews.
pub fn plan_run(project: &ProjectDefinition, options: &RunOptions) -> Result<WavePlan, EngineError> {
    let (graph, scope) = resolve(project, options)?;
    crate::scheduler::plan_waves(&graph, &scope, options.effective_direction())
}

/// Applies `options.action` to every selected service in dependency order.
///
/// Returns the single first failure as the error; on success returns the
/// full report.
pub async fn run_in_dependency_order(
    project: &ProjectDefinition,
    options: &RunOptions,
    collaborators: &Collaborators,
) -> Result<RunReport, EngineError> {
    run_with_cancellation(project, options, collaborators, CancellationToken::new())
        .await?
        .into_result()
}

/// Like [`run_in_dependency_order`], but returns the report even when an
/// action failed, and stops when `cancellation` is triggered.
///
/// Structural errors are still returned as `Err`.
pub async fn run_with_cancellation(
    project: &ProjectDefinition,
    options: &RunOptions,
    collaborators: &Collaborators,
    cancellation: CancellationToken,
) -> Result<RunReport, EngineError> {
    let (graph, scope) = resolve(project, options)?;
    let scheduler = Scheduler::new(graph, scope, options.action, Arc::clone(&collaborators.action))
        .with_direction(options.effective_direction())
        .with_timeout(options.timeout)
        .with_reporter(Arc::clone(&collaborators.reporter))
        .with_cancellation(cancellation);

    let plan = scheduler.plan()?;

    let discovered = collaborators
        .inventory
        .list_resources()
        .await
        .map_err(|error| EngineError::Discovery {
            message: format!("{error:#}"),
        })?;
    let resources = group_by_service(discovered, scheduler.scope());
    info!(
        project = project.name.as_deref().unwrap_or("default"),
        instances = resources.values().map(Vec::len).sum::<usize>(),
        "resources discovered"
    );

    Ok(scheduler.run_planned(&plan, &resources).await)
}

fn resolve(project: &ProjectDefinition, options: &RunOptions) -> Result<(DependencyGraph, ExecutionScope), EngineError> {
    let graph = DependencyGraph::from_services(project.service_definitions(), options.action)?;
    let scope = ExecutionScope::resolve(&graph, &options.targets)?;
    Ok((graph, scope))
}
