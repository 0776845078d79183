//! Wave-based topological execution.
//!
//! The scheduler repeatedly selects every in-scope service whose blockers are
//! complete, runs that wave concurrently, and waits for the whole wave before
//! selecting the next one. A failed wave stops all forward progress.

use std::{sync::Arc, time::Duration};

use indexmap::IndexMap;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use convoy_types::{ActionKind, ExecutionDirection};

use crate::{
    action::ResourceAction,
    error::EngineError,
    fanout::{FanOut, ServiceOutcome},
    graph::DependencyGraph,
    inventory::ResourceMap,
    outcome::{FailureSlot, NodeState, RunReport},
    reporter::{EventReporter, NoopReporter},
    scope::ExecutionScope,
};

/// The waves a run would execute if every action succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WavePlan {
    pub direction: ExecutionDirection,
    pub waves: Vec<Vec<String>>,
}

impl WavePlan {
    /// Wave index of `service`, if it is scheduled at all.
    pub fn wave_of(&self, service: &str) -> Option<usize> {
        self.waves.iter().position(|wave| wave.iter().any(|name| name == service))
    }
}

/// Computes the full wave plan, failing on cycles among in-scope services.
///
/// Out-of-scope services count as complete from the start.
pub fn plan_waves(graph: &DependencyGraph, scope: &ExecutionScope, direction: ExecutionDirection) -> Result<WavePlan, EngineError> {
    let mut states = initial_states(graph, scope);
    let mut waves = Vec::new();
    loop {
        let wave = next_wave(graph, scope, direction, &states);
        if wave.is_empty() {
            break;
        }
        for service in &wave {
            states.insert(service.clone(), NodeState::Done);
        }
        waves.push(wave);
    }

    let blocked: Vec<String> = states
        .iter()
        .filter(|(_, state)| **state != NodeState::Done)
        .map(|(service, _)| service.clone())
        .collect();
    if !blocked.is_empty() {
        return Err(EngineError::CyclicDependency { services: blocked });
    }

    Ok(WavePlan { direction, waves })
}

/// In-scope services, all pending, in definition order.
fn initial_states(graph: &DependencyGraph, scope: &ExecutionScope) -> IndexMap<String, NodeState> {
    graph
        .node_names()
        .filter(|service| scope.contains(service))
        .map(|service| (service.to_string(), NodeState::Pending))
        .collect()
}

/// Pending in-scope services whose in-scope blockers are all done.
fn next_wave(
    graph: &DependencyGraph,
    scope: &ExecutionScope,
    direction: ExecutionDirection,
    states: &IndexMap<String, NodeState>,
) -> Vec<String> {
    states
        .iter()
        .filter(|(_, state)| **state == NodeState::Pending)
        .filter(|(service, _)| {
            graph.blockers(service, direction).is_none_or(|blockers| {
                blockers
                    .iter()
                    .all(|blocker| !scope.contains(blocker) || states.get(blocker) == Some(&NodeState::Done))
            })
        })
        .map(|(service, _)| service.clone())
        .collect()
}

/// Executes a graph wave by wave.
pub struct Scheduler {
    graph: DependencyGraph,
    scope: ExecutionScope,
    action_kind: ActionKind,
    direction: ExecutionDirection,
    timeout: Option<Duration>,
    action: Arc<dyn ResourceAction>,
    reporter: Arc<dyn EventReporter>,
    cancellation: CancellationToken,
}

impl Scheduler {
    pub fn new(graph: DependencyGraph, scope: ExecutionScope, action_kind: ActionKind, action: Arc<dyn ResourceAction>) -> Self {
        Self {
            graph,
            scope,
            action_kind,
            direction: action_kind.default_direction(),
            timeout: None,
            action,
            reporter: Arc::new(NoopReporter),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_direction(mut self, direction: ExecutionDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn EventReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Uses a caller-owned token as the root of the run's cancellation tree.
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn scope(&self) -> &ExecutionScope {
        &self.scope
    }

    /// The wave plan for this run; fails on cycles.
    pub fn plan(&self) -> Result<WavePlan, EngineError> {
        plan_waves(&self.graph, &self.scope, self.direction)
    }

    /// Runs every wave.
    ///
    /// Structural problems are returned as `Err` before any action runs. Action
    /// failures and cancellation are recorded in [`RunReport::failure`].
    pub async fn run(&self, resources: &ResourceMap) -> Result<RunReport, EngineError> {
        let plan = self.plan()?;
        Ok(self.run_planned(&plan, resources).await)
    }

    /// Runs every wave of a plan previously obtained from [`Scheduler::plan`].
    ///
    /// Waves are recomputed from live node states so a failed wave stops
    /// progress; `plan` only proves the graph can be ordered.
    pub async fn run_planned(&self, plan: &WavePlan, resources: &ResourceMap) -> RunReport {
        info!(
            action = %self.action_kind,
            direction = ?self.direction,
            services = self.scope.len(),
            planned_waves = plan.waves.len(),
            "run started"
        );

        let mut report = RunReport::new(self.action_kind, self.direction);
        let mut states = initial_states(&self.graph, &self.scope);
        let run_failure = Arc::new(FailureSlot::new());

        loop {
            if self.cancellation.is_cancelled() {
                run_failure.record(EngineError::Cancelled);
                break;
            }

            let wave = next_wave(&self.graph, &self.scope, self.direction, &states);
            if wave.is_empty() {
                break;
            }
            for service in &wave {
                states.insert(service.clone(), NodeState::Runnable);
            }

            let wave_index = report.waves.len();
            info!(wave = wave_index, services = ?wave, "wave started");
            let outcomes = self.run_wave(&wave, resources, &mut states, &run_failure).await;

            for outcome in outcomes {
                let state = if outcome.is_success() { NodeState::Done } else { NodeState::Failed };
                states.insert(outcome.service.clone(), state);
                report.outcomes.extend(outcome.outcomes);
            }
            report.waves.push(wave);

            if run_failure.is_set() {
                warn!(wave = wave_index, "wave failed; no further waves will start");
                break;
            }
            debug!(wave = wave_index, "wave completed");
        }

        report.states = states;
        report.failure = run_failure.take();
        let (succeeded, failed) = report.tally();
        info!(
            action = %self.action_kind,
            waves = report.waves.len(),
            succeeded,
            failed,
            not_started = report.not_started().len(),
            "run finished"
        );
        report
    }

    async fn run_wave(
        &self,
        wave: &[String],
        resources: &ResourceMap,
        states: &mut IndexMap<String, NodeState>,
        run_failure: &Arc<FailureSlot>,
    ) -> Vec<ServiceOutcome> {
        let fan_out = FanOut {
            action_kind: self.action_kind,
            timeout: self.timeout,
            action: Arc::clone(&self.action),
            reporter: Arc::clone(&self.reporter),
            cancellation: self.cancellation.child_token(),
            run_cancellation: self.cancellation.clone(),
            run_failure: Arc::clone(run_failure),
        };

        let mut handles: Vec<(String, JoinHandle<ServiceOutcome>)> = Vec::with_capacity(wave.len());
        for service in wave {
            states.insert(service.clone(), NodeState::Running);
            let instances = resources.get(service).cloned().unwrap_or_default();
            let fan_out = fan_out.clone();
            let name = service.clone();
            handles.push((service.clone(), tokio::spawn(async move { fan_out.run(&name, instances).await })));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (service, handle) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(join_error) => {
                    let error = EngineError::service_task_failure(service.clone(), join_error.to_string());
                    let surfaced = if self.cancellation.is_cancelled() { EngineError::Cancelled } else { error.clone() };
                    run_failure.record(surfaced);
                    fan_out.cancellation.cancel();
                    outcomes.push(ServiceOutcome {
                        service,
                        outcomes: Vec::new(),
                        error: Some(error),
                    });
                }
            }
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DependencyEdge, ServiceNode};

    fn node(name: &str, dependencies: &[&str]) -> ServiceNode {
        ServiceNode::new(name, dependencies.iter().map(|target| DependencyEdge::new(*target, true)).collect())
    }

    fn names(wave: &[&str]) -> Vec<String> {
        wave.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn diamond_plans_three_waves() {
        let graph = DependencyGraph::build(vec![
            node("a", &[]),
            node("b", &["a"]),
            node("c", &["a"]),
            node("d", &["b", "c"]),
        ])
        .expect("graph");
        let scope = ExecutionScope::resolve(&graph, &[]).expect("scope");

        let plan = plan_waves(&graph, &scope, ExecutionDirection::DependenciesFirst).expect("plan");
        assert_eq!(plan.waves, vec![names(&["a"]), names(&["b", "c"]), names(&["d"])]);

        let reverse = plan_waves(&graph, &scope, ExecutionDirection::DependentsFirst).expect("plan");
        assert_eq!(reverse.waves, vec![names(&["d"]), names(&["b", "c"]), names(&["a"])]);
    }

    #[test]
    fn out_of_scope_blockers_do_not_block() {
        let graph = DependencyGraph::build(vec![node("a", &[]), node("b", &["a"]), node("c", &["b"])]).expect("graph");
        let scope = ExecutionScope::resolve(&graph, &["c".into(), "a".into()]).expect("scope");

        let plan = plan_waves(&graph, &scope, ExecutionDirection::DependenciesFirst).expect("plan");
        assert_eq!(plan.waves, vec![names(&["a", "c"])]);
        assert_eq!(plan.wave_of("b"), None);
    }

    #[test]
    fn cycle_is_reported_with_blocked_services() {
        let graph = DependencyGraph::build(vec![node("a", &[]), node("b", &["c"]), node("c", &["b"]), node("d", &["c"])]).expect("graph");
        let scope = ExecutionScope::resolve(&graph, &[]).expect("scope");

        let error = plan_waves(&graph, &scope, ExecutionDirection::DependenciesFirst).expect_err("cycle");
        assert_eq!(
            error,
            EngineError::CyclicDependency {
                services: names(&["b", "c", "d"])
            }
        );
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let graph = DependencyGraph::build(vec![node("a", &["a"])]).expect("graph");
        let scope = ExecutionScope::resolve(&graph, &[]).expect("scope");
        let error = plan_waves(&graph, &scope, ExecutionDirection::DependenciesFirst).expect_err("cycle");
        assert!(matches!(error, EngineError::CyclicDependency { .. }));
    }

    #[test]
    fn cycle_outside_scope_is_ignored() {
        let graph = DependencyGraph::build(vec![node("a", &[]), node("b", &["c"]), node("c", &["b"])]).expect("graph");
        let scope = ExecutionScope::resolve(&graph, &["a".into(), "b".into()]).expect("scope");
        let plan = plan_waves(&graph, &scope, ExecutionDirection::DependenciesFirst).expect("plan");
        assert_eq!(plan.waves, vec![names(&["a", "b"])]);
    }

    #[tokio::test]
    async fn planned_run_executes_the_plan_once_per_wave() {
        use crate::action::NoopAction;
        use convoy_types::ResourceInstance;

        let graph = DependencyGraph::build(vec![node("db", &[]), node("web", &["db"])]).expect("graph");
        let scope = ExecutionScope::resolve(&graph, &[]).expect("scope");
        let scheduler = Scheduler::new(graph, scope, ActionKind::Start, Arc::new(NoopAction));

        let plan = scheduler.plan().expect("plan");
        let mut resources = ResourceMap::new();
        resources.insert("db".into(), vec![ResourceInstance::replica("shop", "db", 1)]);
        resources.insert("web".into(), vec![ResourceInstance::replica("shop", "web", 1)]);

        let report = scheduler.run_planned(&plan, &resources).await;
        assert!(report.is_success());
        assert_eq!(report.waves, plan.waves);
        assert_eq!(report.tally(), (2, 0));
    }
}
