use std::path::Path;

use serde::Deserialize;
use tokio::process::Command;

use crate::error::{OrchestratorError, Result};

/// State of one runtime unit inside an instance's project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitState {
    pub name: String,
    pub state: String,
}

impl UnitState {
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }
}

/// The narrow slice of a container runtime the lifecycle controller needs.
/// One implementation per target runtime; tests supply their own.
#[allow(async_fn_in_trait)]
pub trait ContainerRuntime {
    async fn bring_up(&self, manifest: &Path, project: &str) -> Result<()>;
    async fn tear_down(&self, manifest: &Path, project: &str) -> Result<()>;
    async fn query(&self, manifest: &Path, project: &str) -> Result<Vec<UnitState>>;
}

/// Drives instances through the `docker compose` CLI.
pub struct ComposeCli;

impl ComposeCli {
    async fn run(&self, manifest: &Path, project: &str, args: &[&str]) -> Result<String> {
        let manifest = manifest.to_string_lossy();
        let output = Command::new("docker")
            .args(["compose", "-f", manifest.as_ref(), "-p", project])
            .args(args)
            .output()
            .await
            .map_err(|e| OrchestratorError::Runtime(format!("failed to run docker compose: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OrchestratorError::Runtime(format!(
                "docker compose {} failed (exit {}): {stderr}",
                args.join(" "),
                output.status.code().unwrap_or(-1)
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl ContainerRuntime for ComposeCli {
    async fn bring_up(&self, manifest: &Path, project: &str) -> Result<()> {
        self.run(manifest, project, &["up", "-d"]).await?;
        Ok(())
    }

    async fn tear_down(&self, manifest: &Path, project: &str) -> Result<()> {
        self.run(manifest, project, &["down"]).await?;
        Ok(())
    }

    async fn query(&self, manifest: &Path, project: &str) -> Result<Vec<UnitState>> {
        let stdout = self
            .run(manifest, project, &["ps", "--format", "json"])
            .await?;
        parse_ps_output(&stdout)
    }
}

#[derive(Debug, Deserialize)]
struct PsEntry {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "State")]
    state: String,
}

/// Parse `docker compose ps --format json` output. Newer runtimes emit one
/// JSON object per line, older ones a single array.
fn parse_ps_output(stdout: &str) -> Result<Vec<UnitState>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let entries: Vec<PsEntry> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed)?
    } else {
        trimmed
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(serde_json::from_str)
            .collect::<std::result::Result<_, _>>()?
    };
    Ok(entries
        .into_iter()
        .map(|e| UnitState {
            name: e.name,
            state: e.state,
        })
        .collect())
}
