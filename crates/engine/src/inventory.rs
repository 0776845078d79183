//! Resource discovery.
//!
//! Discovery is performed once per run, before scheduling. The engine groups
//! the discovered instances by service and never looks them up again.

use anyhow::Result;
use async_trait::async_trait;
use indexmap::IndexMap;
use tracing::debug;

use convoy_types::{ProjectDefinition, ResourceInstance};

use crate::scope::ExecutionScope;

/// Instances grouped by owning service.
pub type ResourceMap = IndexMap<String, Vec<ResourceInstance>>;

/// Lists the resource instances belonging to a project.
#[async_trait]
pub trait ResourceInventory: Send + Sync {
    async fn list_resources(&self) -> Result<Vec<ResourceInstance>>;
}

/// In-memory inventory.
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    resources: Vec<ResourceInstance>,
}

impl StaticInventory {
    pub fn new(resources: Vec<ResourceInstance>) -> Self {
        Self { resources }
    }

    /// One replica per declared instance of every service in the project.
    pub fn from_project(project_name: &str, project: &ProjectDefinition) -> Self {
        let resources = project
            .service_definitions()
            .flat_map(|service| {
                (1..=service.instance_count()).map(move |number| ResourceInstance::replica(project_name, &service.name, number))
            })
            .collect();
        Self { resources }
    }
}

#[async_trait]
impl ResourceInventory for StaticInventory {
    async fn list_resources(&self) -> Result<Vec<ResourceInstance>> {
        Ok(self.resources.clone())
    }
}

/// Groups instances by service, keeping only in-scope services.
///
/// One-off instances are excluded. Every in-scope service gets an entry, even
/// when it owns no instances.
pub fn group_by_service(resources: Vec<ResourceInstance>, scope: &ExecutionScope) -> ResourceMap {
    let mut grouped: ResourceMap = scope.iter().map(|service| (service.to_string(), Vec::new())).collect();
    let mut excluded = 0usize;
    for resource in resources {
        if resource.one_off {
            excluded += 1;
            continue;
        }
        if let Some(instances) = grouped.get_mut(&resource.service) {
            instances.push(resource);
        }
    }
    debug!(services = grouped.len(), one_off_excluded = excluded, "grouped resources by service");
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DependencyGraph, ServiceNode};
    use convoy_types::ServiceDefinition;

    #[tokio::test]
    async fn project_inventory_creates_declared_replicas() {
        let project = ProjectDefinition::new("shop")
            .with_service(ServiceDefinition::new("db"))
            .with_service(ServiceDefinition {
                instances: Some(2),
                ..ServiceDefinition::new("web")
            });

        let resources = StaticInventory::from_project("shop", &project).list_resources().await.expect("list");
        let names: Vec<&str> = resources.iter().map(|resource| resource.name.as_str()).collect();
        assert_eq!(names, vec!["shop-db-1", "shop-web-1", "shop-web-2"]);
    }

    #[test]
    fn grouping_skips_one_off_and_out_of_scope_instances() {
        let graph = DependencyGraph::build(vec![ServiceNode::new("db", vec![]), ServiceNode::new("web", vec![])]).expect("graph");
        let scope = ExecutionScope::resolve(&graph, &["web".into()]).expect("scope");

        let mut one_off = ResourceInstance::replica("shop", "web", 9);
        one_off.one_off = true;
        let resources = vec![
            ResourceInstance::replica("shop", "db", 1),
            ResourceInstance::replica("shop", "web", 1),
            one_off,
        ];

        let grouped = group_by_service(resources, &scope);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped["web"].len(), 1);
        assert_eq!(grouped["web"][0].number, 1);
    }
}
