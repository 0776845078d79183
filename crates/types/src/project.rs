//! Project and service definitions.
//!
//! The shapes here follow the compose authoring model: a project owns named
//! services, and each service declares the services it depends on together with
//! a rule describing how that dependency behaves. Maps preserve authoring order
//! (via `IndexMap`) so plans and reports list services predictably.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::ActionKind;

/// A named collection of services loaded from a project file or built in code.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ProjectDefinition {
    /// Optional project name; loaders fall back to a path-derived name.
    #[serde(default)]
    pub name: Option<String>,
    /// Services keyed by name, in authoring order.
    #[serde(default)]
    pub services: IndexMap<String, ServiceDefinition>,
    /// Command templates keyed by action name (`start`, `stop`, `restart`).
    #[serde(default)]
    pub commands: IndexMap<String, String>,
}

impl ProjectDefinition {
    /// Creates an empty project with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Adds (or replaces) a service, keyed by its name.
    pub fn with_service(mut self, service: ServiceDefinition) -> Self {
        self.services.insert(service.name.clone(), service);
        self
    }

    /// Copies each map key into the matching definition's `name` field.
    ///
    /// Deserialized definitions carry their name only as the map key.
    pub fn normalize_service_names(&mut self) {
        for (name, service) in self.services.iter_mut() {
            service.name = name.clone();
        }
    }

    /// Service definitions in authoring order.
    pub fn service_definitions(&self) -> impl Iterator<Item = &ServiceDefinition> {
        self.services.values()
    }

    /// Returns the command template configured for an action, if any.
    pub fn command_for(&self, action: ActionKind) -> Option<&str> {
        self.commands.get(action.as_str()).map(String::as_str)
    }
}

/// A single service and the services it depends on.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ServiceDefinition {
    /// Service name. Filled from the map key when loaded from a file.
    #[serde(default, skip_serializing)]
    pub name: String,
    /// Optional description, shown in `convoy plan` output.
    #[serde(default)]
    pub description: Option<String>,
    /// Dependencies keyed by target service name.
    #[serde(default, deserialize_with = "deserialize_dependencies")]
    pub depends_on: IndexMap<String, DependencyRule>,
    /// Number of declared instances (replicas). `None` means one.
    #[serde(default)]
    pub instances: Option<u32>,
}

impl ServiceDefinition {
    /// Creates a service with no dependencies.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Adds a dependency on `target` governed by `rule`.
    pub fn depends_on(mut self, target: impl Into<String>, rule: DependencyRule) -> Self {
        self.depends_on.insert(target.into(), rule);
        self
    }

    /// Declared instance count, defaulting to one.
    pub fn instance_count(&self) -> u32 {
        self.instances.unwrap_or(1)
    }
}

/// How a declared dependency behaves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DependencyRule {
    /// Readiness condition of the dependency.
    #[serde(default)]
    pub condition: DependencyCondition,
    /// Whether restarting the dependency must also order (and wait on) this service.
    #[serde(default)]
    pub restart: bool,
    /// Whether the dependency must exist. Optional dependencies on unknown services are ignored.
    #[serde(default = "default_required")]
    pub required: bool,
}

impl Default for DependencyRule {
    fn default() -> Self {
        Self {
            condition: DependencyCondition::default(),
            restart: false,
            required: true,
        }
    }
}

impl DependencyRule {
    /// A required dependency that also propagates restarts.
    pub fn restarting() -> Self {
        Self {
            restart: true,
            ..Default::default()
        }
    }

    /// A dependency that may be absent from the project.
    pub fn optional() -> Self {
        Self {
            required: false,
            ..Default::default()
        }
    }

    /// Whether this dependency edge must be honored when applying `action`.
    ///
    /// Restarting only waits on dependencies declared with `restart: true`;
    /// every other action honors all declared dependencies.
    pub fn propagates_for(&self, action: ActionKind) -> bool {
        match action {
            ActionKind::Restart => self.restart,
            ActionKind::Start | ActionKind::Stop => true,
        }
    }
}

/// Readiness condition attached to a dependency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DependencyCondition {
    /// The dependency has been started.
    #[default]
    ServiceStarted,
    /// The dependency reports healthy.
    ServiceHealthy,
    /// The dependency ran to successful completion.
    ServiceCompletedSuccessfully,
}

fn default_required() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DependencyCollection {
    Sequence(Vec<String>),
    Map(IndexMap<String, Option<DependencyRule>>),
}

fn deserialize_dependencies<'de, D>(deserializer: D) -> Result<IndexMap<String, DependencyRule>, D::Error>
where
    D: Deserializer<'de>,
{
    let maybe_collection = Option::<DependencyCollection>::deserialize(deserializer)?;
    let mut dependencies = IndexMap::new();
    match maybe_collection {
        Some(DependencyCollection::Sequence(names)) => {
            for name in names {
                dependencies.insert(name, DependencyRule::default());
            }
        }
        Some(DependencyCollection::Map(map)) => {
            for (name, rule) in map {
                dependencies.insert(name, rule.unwrap_or_default());
            }
        }
        None => {}
    }
    Ok(dependencies)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depends_on_accepts_list_and_map_forms() {
        let yaml_text = r#"
name: shop
services:
  db: {}
  cache: {}
  web:
    depends_on: [db, cache]
  worker:
    instances: 3
    depends_on:
      db:
        condition: service_healthy
        restart: true
      metrics:
        required: false
"#;

        let mut project: ProjectDefinition = serde_yaml::from_str(yaml_text).expect("deserialize project");
        project.normalize_service_names();

        assert_eq!(project.services.len(), 4);
        let web = &project.services["web"];
        assert_eq!(web.name, "web");
        assert_eq!(web.depends_on.keys().collect::<Vec<_>>(), vec!["db", "cache"]);
        assert_eq!(web.depends_on["db"], DependencyRule::default());

        let worker = &project.services["worker"];
        assert_eq!(worker.instance_count(), 3);
        assert_eq!(worker.depends_on["db"].condition, DependencyCondition::ServiceHealthy);
        assert!(worker.depends_on["db"].restart);
        assert!(!worker.depends_on["metrics"].required);
    }

    #[test]
    fn restart_only_propagates_across_restart_edges() {
        let plain = DependencyRule::default();
        let restarting = DependencyRule::restarting();

        assert!(!plain.propagates_for(ActionKind::Restart));
        assert!(restarting.propagates_for(ActionKind::Restart));
        assert!(plain.propagates_for(ActionKind::Start));
        assert!(plain.propagates_for(ActionKind::Stop));
    }

    #[test]
    fn command_lookup_uses_action_name() {
        let yaml_text = r#"
commands:
  restart: "docker restart {resource}"
services: {}
"#;
        let project: ProjectDefinition = serde_yaml::from_str(yaml_text).expect("deserialize project");
        assert_eq!(project.command_for(ActionKind::Restart), Some("docker restart {resource}"));
        assert_eq!(project.command_for(ActionKind::Stop), None);
    }
}
