//! Shell-backed resource action.

use std::process::Stdio;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use convoy_engine::{ActionContext, ResourceAction};
use convoy_types::ResourceInstance;

/// Runs a command template through `sh -c` for every instance.
///
/// Supported placeholders: `{resource}`, `{id}`, `{service}`, `{action}`.
pub struct ShellAction {
    template: String,
}

impl ShellAction {
    pub fn new(template: impl Into<String>) -> Self {
        Self { template: template.into() }
    }

    /// Expands the template for one instance.
    pub fn render(&self, context: &ActionContext, resource: &ResourceInstance) -> String {
        self.template
            .replace("{resource}", &resource.name)
            .replace("{id}", &resource.id)
            .replace("{service}", &context.service)
            .replace("{action}", context.action.as_str())
    }
}

#[async_trait]
impl ResourceAction for ShellAction {
    async fn apply(&self, context: &ActionContext, resource: &ResourceInstance) -> Result<()> {
        let command = self.render(context, resource);
        debug!(resource = %resource.name, command = %command, "running shell command");

        let child = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        // Dropping the child future kills the process.
        let output = tokio::select! {
            output = child => output.with_context(|| format!("failed to spawn `{command}`"))?,
            _ = context.cancelled() => bail!("cancelled before `{command}` finished"),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("`{command}` exited with {}: {}", output.status, stderr.trim());
        }
        Ok(())
    }
}
