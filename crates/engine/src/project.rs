//! Project file loading and validation.

use std::{fs, path::Path};

use anyhow::{Context, Result, bail};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use convoy_types::ProjectDefinition;

static NAME_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_.-]*$").expect("name regex should compile"));

/// Loads a project file with automatic format detection.
///
/// Files ending in `.json` are parsed as JSON; everything else as YAML. The
/// project name is lower-cased and, when absent, derived from the name of the
/// directory containing the file.
///
/// # Errors
///
/// Fails when the file cannot be read or parsed, or when a project or service
/// name is invalid.
pub fn load_project_file(file_path: impl AsRef<Path>) -> Result<ProjectDefinition> {
    let file_path = file_path.as_ref();
    let content = fs::read_to_string(file_path).with_context(|| format!("Failed to read project file: {}", file_path.display()))?;

    let is_json = file_path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));
    let parsed = if is_json {
        parse_project_json(&content)
    } else {
        parse_project_yaml(&content)
    };
    let mut project = parsed.with_context(|| format!("Failed to parse project file: {}", file_path.display()))?;

    if project.name.is_none() {
        project.name = directory_name(file_path).map(|name| sanitize_name(&name)).filter(|name| !name.is_empty());
    }
    normalize_project(&mut project)?;
    debug!(
        project = project.name.as_deref().unwrap_or("default"),
        services = project.services.len(),
        "project loaded"
    );
    Ok(project)
}

/// Parses a YAML project document and normalizes it.
pub fn parse_project_yaml(content: &str) -> Result<ProjectDefinition> {
    let mut project: ProjectDefinition = serde_yaml::from_str(content)?;
    normalize_project(&mut project)?;
    Ok(project)
}

/// Parses a JSON project document and normalizes it.
pub fn parse_project_json(content: &str) -> Result<ProjectDefinition> {
    let mut project: ProjectDefinition = serde_json::from_str(content)?;
    normalize_project(&mut project)?;
    Ok(project)
}

/// Project name used for labels and replica names.
pub fn project_name(project: &ProjectDefinition) -> &str {
    project.name.as_deref().unwrap_or("default")
}

fn normalize_project(project: &mut ProjectDefinition) -> Result<()> {
    if let Some(name) = project.name.as_mut() {
        *name = name.trim().to_lowercase();
        validate_name("project", name)?;
    }
    project.normalize_service_names();
    for service in project.services.keys() {
        validate_name("service", service)?;
    }
    Ok(())
}

fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("{kind} name cannot be empty");
    }
    if !NAME_REGEX.is_match(name) {
        bail!("invalid {kind} name '{name}': must contain only lowercase letters, numbers, dots, underscores, and hyphens");
    }
    Ok(())
}

/// Lower-cases `name` and drops characters not allowed in project names.
fn sanitize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|character| character.is_ascii_alphanumeric() || matches!(character, '_' | '-'))
        .skip_while(|character| !character.is_ascii_alphanumeric())
        .collect()
}

fn directory_name(file_path: &Path) -> Option<String> {
    let parent = file_path.parent()?;
    let parent = if parent.as_os_str().is_empty() {
        std::env::current_dir().ok()?
    } else {
        parent.canonicalize().unwrap_or_else(|_| parent.to_path_buf())
    };
    parent.file_name().and_then(|name| name.to_str()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_project_file_loads_with_dependencies() {
        let temp_dir = tempfile::tempdir().unwrap();
        let project_path = temp_dir.path().join("convoy.yaml");
        fs::write(
            &project_path,
            r#"
name: Shop
commands:
  restart: "echo restart {resource}"
services:
  db: {}
  web:
    instances: 2
    depends_on:
      db:
        restart: true
"#,
        )
        .unwrap();

        let project = load_project_file(&project_path).expect("load project");
        assert_eq!(project.name.as_deref(), Some("shop"));
        assert_eq!(project.services["web"].name, "web");
        assert!(project.services["web"].depends_on["db"].restart);
    }

    #[test]
    fn json_project_file_loads() {
        let temp_dir = tempfile::tempdir().unwrap();
        let project_path = temp_dir.path().join("project.json");
        fs::write(
            &project_path,
            r#"{"name": "api", "services": {"db": {}, "api": {"depends_on": ["db"]}}}"#,
        )
        .unwrap();

        let project = load_project_file(&project_path).expect("load project");
        assert_eq!(project_name(&project), "api");
        assert_eq!(project.services.len(), 2);
    }

    #[test]
    fn missing_name_falls_back_to_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let project_dir = temp_dir.path().join("billing");
        fs::create_dir_all(&project_dir).unwrap();
        let project_path = project_dir.join("convoy.yaml");
        fs::write(&project_path, "services:\n  db: {}\n").unwrap();

        let project = load_project_file(&project_path).expect("load project");
        assert_eq!(project.name.as_deref(), Some("billing"));
    }

    #[test]
    fn derived_names_are_sanitized() {
        assert_eq!(sanitize_name("My Shop"), "myshop");
        assert_eq!(sanitize_name(".tmp_Dir-1"), "tmp_dir-1");
    }

    #[test]
    fn invalid_service_name_is_rejected() {
        let error = parse_project_yaml("services:\n  Web App: {}\n").expect_err("invalid name");
        assert!(error.to_string().contains("invalid service name 'Web App'"), "unexpected error: {error}");
    }

    #[test]
    fn unreadable_file_reports_path() {
        let error = load_project_file("/definitely/missing/convoy.yaml").expect_err("missing file");
        assert!(error.to_string().contains("Failed to read project file"), "unexpected error: {error}");
    }
}
