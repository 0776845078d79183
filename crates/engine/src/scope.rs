//! Resolution of the services selected for a run.

use indexmap::IndexSet;

use crate::{error::EngineError, graph::DependencyGraph};

/// The set of services actually acted upon during a run.
///
/// Services outside the scope are never touched and count as already
/// complete for ordering purposes. Dependencies of a targeted service are not
/// pulled in implicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionScope {
    services: IndexSet<String>,
}

impl ExecutionScope {
    /// Resolves `targets` against the graph.
    ///
    /// An empty target list selects every service in definition order.
    /// Otherwise exactly the named services are selected, de-duplicated in
    /// first-mention order.
    pub fn resolve(graph: &DependencyGraph, targets: &[String]) -> Result<Self, EngineError> {
        if targets.is_empty() {
            return Ok(Self {
                services: graph.node_names().map(str::to_string).collect(),
            });
        }

        let mut services = IndexSet::with_capacity(targets.len());
        for target in targets {
            if !graph.contains(target) {
                return Err(EngineError::unknown_service(target.clone()));
            }
            services.insert(target.clone());
        }
        Ok(Self { services })
    }

    pub fn contains(&self, service: &str) -> bool {
        self.services.contains(service)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Selected services in resolution order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.services.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DependencyEdge, ServiceNode};

    fn graph() -> DependencyGraph {
        DependencyGraph::build(vec![
            ServiceNode::new("db", vec![]),
            ServiceNode::new("web", vec![DependencyEdge::new("db", true)]),
            ServiceNode::new("worker", vec![]),
        ])
        .expect("build graph")
    }

    #[test]
    fn empty_targets_select_everything() {
        let scope = ExecutionScope::resolve(&graph(), &[]).expect("resolve scope");
        assert_eq!(scope.iter().collect::<Vec<_>>(), vec!["db", "web", "worker"]);
    }

    #[test]
    fn explicit_targets_are_not_expanded() {
        let scope = ExecutionScope::resolve(&graph(), &["web".into(), "worker".into(), "web".into()]).expect("resolve scope");
        assert_eq!(scope.iter().collect::<Vec<_>>(), vec!["web", "worker"]);
        assert!(!scope.contains("db"));
    }

    #[test]
    fn unknown_target_is_rejected() {
        let error = ExecutionScope::resolve(&graph(), &["web".into(), "queue".into()]).expect_err("should fail");
        assert_eq!(error, EngineError::unknown_service("queue"));
    }
}
