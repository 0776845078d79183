//! Concrete resource instances backing a service.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One concrete unit (for example a container) owned by a service.
///
/// Instances are produced by a discovery collaborator; the engine only reads
/// their identity and hands them to the action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ResourceInstance {
    /// Stable identifier understood by the action (container id, unit name, ...).
    pub id: String,
    /// Human-readable name used in progress output.
    pub name: String,
    /// Name of the owning service.
    pub service: String,
    /// Replica number within the service, starting at 1.
    #[serde(default)]
    pub number: u32,
    /// Whether the instance was created for a one-off run rather than by the service.
    #[serde(default)]
    pub one_off: bool,
    /// Free-form labels attached by discovery.
    #[serde(default)]
    pub labels: IndexMap<String, String>,
}

impl ResourceInstance {
    /// Creates a service-owned replica named `<project>-<service>-<number>`.
    pub fn replica(project: &str, service: &str, number: u32) -> Self {
        let name = format!("{project}-{service}-{number}");
        Self {
            id: name.clone(),
            name,
            service: service.to_string(),
            number,
            one_off: false,
            labels: IndexMap::new(),
        }
    }

    /// Name shown next to progress labels, e.g. `Container shop-web-1`.
    pub fn progress_name(&self) -> String {
        format!("Container {}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replica_naming_follows_project_service_number() {
        let instance = ResourceInstance::replica("shop", "web", 2);
        assert_eq!(instance.id, "shop-web-2");
        assert_eq!(instance.progress_name(), "Container shop-web-2");
        assert_eq!(instance.service, "web");
        assert!(!instance.one_off);
    }
}
