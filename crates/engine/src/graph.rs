//! Dependency graph construction.
//!
//! The graph is built once per run from the service definitions and never
//! mutated afterwards. Only edges that propagate for the current action are
//! kept; every other declared relation is dropped before the graph exists, so
//! the scheduler never has to special-case them.

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, warn};

use convoy_types::{ActionKind, ExecutionDirection, ServiceDefinition};

use crate::error::EngineError;

/// A declared dependency of a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    /// Service that must complete first.
    pub target: String,
    /// Whether the current action has to wait on `target`.
    pub propagates: bool,
    /// Whether `target` must exist in the project.
    pub required: bool,
}

impl DependencyEdge {
    pub fn new(target: impl Into<String>, propagates: bool) -> Self {
        Self {
            target: target.into(),
            propagates,
            required: true,
        }
    }
}

/// A service and its outgoing dependency edges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceNode {
    pub name: String,
    pub edges: Vec<DependencyEdge>,
}

impl ServiceNode {
    pub fn new(name: impl Into<String>, edges: Vec<DependencyEdge>) -> Self {
        Self { name: name.into(), edges }
    }

    /// Derives the node for `definition`, annotating each edge for `action`.
    pub fn from_definition(definition: &ServiceDefinition, action: ActionKind) -> Self {
        let edges = definition
            .depends_on
            .iter()
            .map(|(target, rule)| DependencyEdge {
                target: target.clone(),
                propagates: rule.propagates_for(action),
                required: rule.required,
            })
            .collect();
        Self::new(definition.name.clone(), edges)
    }
}

/// Immutable graph of propagating dependency edges.
///
/// An edge `u -> v` means `u` must complete before `v` may start when running
/// dependencies first.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Node -> the services it depends on.
    dependencies: IndexMap<String, IndexSet<String>>,
    /// Node -> the services that depend on it.
    dependents: IndexMap<String, IndexSet<String>>,
}

impl DependencyGraph {
    /// Builds the graph from service definitions for a given action.
    pub fn from_services<'a>(
        services: impl IntoIterator<Item = &'a ServiceDefinition>,
        action: ActionKind,
    ) -> Result<Self, EngineError> {
        Self::build(services.into_iter().map(|definition| ServiceNode::from_definition(definition, action)))
    }

    /// Builds the graph from nodes whose edges are already annotated.
    ///
    /// Returns an error for duplicate service names or a propagating edge to an
    /// unknown service. Optional edges to unknown services are ignored.
    pub fn build(nodes: impl IntoIterator<Item = ServiceNode>) -> Result<Self, EngineError> {
        let mut lookup: IndexMap<String, Vec<DependencyEdge>> = IndexMap::new();
        for node in nodes {
            if lookup.contains_key(&node.name) {
                return Err(EngineError::invalid_graph(format!("duplicate service name '{}'", node.name)));
            }
            lookup.insert(node.name, node.edges);
        }

        let mut dependencies: IndexMap<String, IndexSet<String>> =
            lookup.keys().map(|name| (name.clone(), IndexSet::new())).collect();
        let mut dependents: IndexMap<String, IndexSet<String>> =
            lookup.keys().map(|name| (name.clone(), IndexSet::new())).collect();

        for (name, edges) in &lookup {
            for edge in edges.iter().filter(|edge| edge.propagates) {
                if !lookup.contains_key(&edge.target) {
                    if !edge.required {
                        warn!(service = %name, dependency = %edge.target, "ignoring optional dependency on unknown service");
                        continue;
                    }
                    return Err(EngineError::invalid_graph(format!(
                        "service '{}' depends on unknown service '{}'",
                        name, edge.target
                    )));
                }
                if let Some(set) = dependencies.get_mut(name) {
                    set.insert(edge.target.clone());
                }
                if let Some(set) = dependents.get_mut(&edge.target) {
                    set.insert(name.clone());
                }
            }
        }

        debug!(services = lookup.len(), edges = dependencies.values().map(IndexSet::len).sum::<usize>(), "dependency graph built");
        Ok(Self { dependencies, dependents })
    }

    /// Service names in definition order.
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.dependencies.keys().map(String::as_str)
    }

    pub fn contains(&self, service: &str) -> bool {
        self.dependencies.contains_key(service)
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Services `service` depends on through propagating edges.
    pub fn dependencies_of(&self, service: &str) -> Option<&IndexSet<String>> {
        self.dependencies.get(service)
    }

    /// Services depending on `service` through propagating edges.
    pub fn dependents_of(&self, service: &str) -> Option<&IndexSet<String>> {
        self.dependents.get(service)
    }

    /// Services that must be complete before `service` may run in `direction`.
    pub fn blockers(&self, service: &str, direction: ExecutionDirection) -> Option<&IndexSet<String>> {
        match direction {
            ExecutionDirection::DependenciesFirst => self.dependencies_of(service),
            ExecutionDirection::DependentsFirst => self.dependents_of(service),
        }
    }

    /// All edges as `(dependency, dependent)` pairs, in definition order.
    pub fn edges(&self) -> Vec<(String, String)> {
        self.dependencies
            .iter()
            .flat_map(|(dependent, targets)| targets.iter().map(move |dependency| (dependency.clone(), dependent.clone())))
            .collect()
    }
}
