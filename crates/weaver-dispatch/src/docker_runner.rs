use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::error::AdapterError;
use crate::local_adapter::{ContainerResult, ContainerRunner, ContainerSpec};

/// The one concrete `ContainerRunner` this crate ships: shells out to the
/// `docker` CLI already on the host's `PATH`. Mounts `spec.workdir` at the
/// same path inside the container (read-write) so a step's rendered
/// arguments, which reference paths under `workdir`, resolve identically on
/// both sides — matching the "mounts `workdir` read-write" clause of the
/// local container adapter's contract. A process-isolating runtime
/// (Singularity, gVisor, ...) is still a named-interface swap-in via a
/// different `ContainerRunner` impl; this one exists so the ADES binary has
/// something real to run against out of the box.
pub struct DockerCliContainerRunner;

#[async_trait::async_trait]
impl ContainerRunner for DockerCliContainerRunner {
    async fn run(&self, spec: &ContainerSpec, cancel: &CancellationToken) -> Result<ContainerResult, AdapterError> {
        let mount = format!("{}:{}", spec.workdir.display(), spec.workdir.display());
        let mut command = Command::new("docker");
        command.arg("run").arg("--rm").arg("-v").arg(&mount).arg("-w").arg(&spec.workdir);
        for (key, value) in &spec.env {
            command.arg("-e").arg(format!("{key}={value}"));
        }
        command.arg(&spec.image);
        command.args(&spec.args);

        let child = command
            .kill_on_drop(true)
            .output();

        tokio::select! {
            result = child => {
                let output = result.map_err(|e| AdapterError::Transport { service: "docker".to_string(), detail: e.to_string() })?;
                Ok(ContainerResult {
                    exit_code: output.status.code().unwrap_or(-1),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })
            }
            _ = cancel.cancelled() => Err(AdapterError::Cancelled),
        }
    }
}
