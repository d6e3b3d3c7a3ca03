use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use weaver_contracts::io::{IoEntry, IoValue, PackageIo};
use weaver_package::model::PackageDescription;

use crate::error::AdapterError;
use crate::remote_process::{DispatchHandle, ProgressSink, RemoteProcess};

/// Everything a container runner needs to launch one step: the image, the
/// rendered argument vector, the working directory to mount read-write, and
/// the environment to inject.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub image: String,
    pub args: Vec<String>,
    pub workdir: PathBuf,
    pub env: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct ContainerResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// The named-interface-only collaborator this crate does not implement: an
/// actual container runtime (Docker, Singularity, ...) is out of scope.
#[async_trait]
pub trait ContainerRunner: Send + Sync {
    async fn run(&self, spec: &ContainerSpec, cancel: &CancellationToken) -> Result<ContainerResult, AdapterError>;
}

/// Runs a `CommandLineTool` step as a local container.
///
/// `dispatch` invokes the runner with the image from `DockerRequirement` and
/// a rendered argument vector; `monitor` resolves synchronously since the
/// runner call already blocks until exit. Outputs are discovered via each
/// output's `outputBinding.glob` under `workdir`; a synthetic `stdout.log`
/// sink is always produced.
pub struct LocalContainerAdapter<R: ContainerRunner> {
    runner: R,
    package: PackageDescription,
    workdir: PathBuf,
}

impl<R: ContainerRunner> LocalContainerAdapter<R> {
    pub fn new(runner: R, package: PackageDescription, workdir: PathBuf) -> Self {
        Self { runner, package, workdir }
    }

    fn docker_image(&self) -> Result<String, AdapterError> {
        self.package
            .requirements
            .iter()
            .find(|r| r.get("class").and_then(|c| c.as_str()) == Some("DockerRequirement"))
            .and_then(|r| r.get("dockerPull"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| AdapterError::UnsupportedRequirement { requirement: "DockerRequirement".to_string() })
    }

    /// Renders the argument vector: `baseCommand` first, then each input
    /// sorted by `inputBinding.position` (ties break on declaration order),
    /// each becoming either a positional value or a `prefix value` pair.
    fn render_args(&self, inputs: &[IoEntry]) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(base) = &self.package.base_command {
            match base {
                serde_json::Value::String(s) => args.push(s.clone()),
                serde_json::Value::Array(items) => {
                    args.extend(items.iter().filter_map(|v| v.as_str()).map(str::to_string))
                }
                _ => {}
            }
        }

        let mut bound: Vec<(usize, &PackageIo, &IoEntry)> = self
            .package
            .inputs
            .iter()
            .enumerate()
            .filter_map(|(decl_ix, decl)| inputs.iter().find(|i| i.id == decl.id).map(|entry| (decl_ix, decl, entry)))
            .collect();
        bound.sort_by_key(|(decl_ix, decl, _)| {
            (decl.input_binding.as_ref().and_then(|b| b.position).unwrap_or(i32::MAX), *decl_ix as i32)
        });

        for (_, decl, entry) in bound {
            let rendered = render_value(entry);
            match decl.input_binding.as_ref().and_then(|b| b.prefix.as_deref()) {
                Some(prefix) => {
                    args.push(prefix.to_string());
                    args.push(rendered);
                }
                None => args.push(rendered),
            }
        }
        args
    }
}

fn render_value(entry: &IoEntry) -> String {
    match &entry.value {
        IoValue::Href { href, .. } => href.clone(),
        IoValue::Value { value } => match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    }
}

#[async_trait]
impl<R: ContainerRunner> RemoteProcess for LocalContainerAdapter<R> {
    async fn dispatch(&self, inputs: &[IoEntry], _outputs: &[IoEntry]) -> Result<DispatchHandle, AdapterError> {
        let spec = ContainerSpec {
            image: self.docker_image()?,
            args: self.render_args(inputs),
            workdir: self.workdir.clone(),
            env: Vec::new(),
        };
        Ok(DispatchHandle(Box::new(spec)))
    }

    /// Blocks on the container exit the runner already performed during
    /// `dispatch`'s construction is not possible (the handle only carries the
    /// spec), so the actual run happens here: `success = (exit code == 0)`.
    async fn monitor(&self, handle: &DispatchHandle, _sink: &dyn ProgressSink, cancel: &CancellationToken) -> Result<bool, AdapterError> {
        let spec = handle.0.downcast_ref::<ContainerSpec>().expect("local adapter handle carries a ContainerSpec");
        let result = self.runner.run(spec, cancel).await?;

        tokio::fs::create_dir_all(&spec.workdir)
            .await
            .map_err(|e| AdapterError::Transport { service: "local-container".to_string(), detail: e.to_string() })?;
        let stdout_log = spec.workdir.join("stdout.log");
        tokio::fs::write(&stdout_log, &result.stdout)
            .await
            .map_err(|e| AdapterError::Transport { service: "local-container".to_string(), detail: e.to_string() })?;

        Ok(result.exit_code == 0)
    }

    async fn get_results(&self, handle: &DispatchHandle) -> Result<Vec<IoEntry>, AdapterError> {
        let spec = handle.0.downcast_ref::<ContainerSpec>().expect("local adapter handle carries a ContainerSpec");
        let mut results = vec![IoEntry {
            id: "stdout".to_string(),
            value: IoValue::Href { href: format!("file://{}", spec.workdir.join("stdout.log").display()), mime_type: None },
        }];

        for output in &self.package.outputs {
            let Some(glob) = output.output_binding.as_ref().and_then(|b| b.glob.as_deref()) else { continue };
            if let Some(path) = glob_one(&spec.workdir, glob) {
                results.push(IoEntry { id: output.id.clone(), value: IoValue::Href { href: format!("file://{}", path.display()), mime_type: None } });
            }
        }
        Ok(results)
    }

    async fn stage_results(&self, results: &[IoEntry], _expected: &[IoEntry], _out_dir: &Path) -> Result<Vec<IoEntry>, AdapterError> {
        Ok(results.to_vec())
    }
}

/// A minimal single-star glob matcher sufficient for `outputBinding.glob`
/// patterns (`*.nc`, `result.txt`, ...); returns the first match in directory
/// iteration order.
fn glob_one(dir: &Path, pattern: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if glob_match(pattern, &name) {
            return Some(entry.path());
        }
    }
    None
}

fn glob_match(pattern: &str, name: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == name,
        Some((prefix, suffix)) => name.starts_with(prefix) && name.ends_with(suffix) && name.len() >= prefix.len() + suffix.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote_process::NullProgressSink;
    use weaver_contracts::io::{InputBinding, OutputBinding, PackageType};

    struct StubRunner {
        exit_code: i32,
    }

    #[async_trait]
    impl ContainerRunner for StubRunner {
        async fn run(&self, _spec: &ContainerSpec, _cancel: &CancellationToken) -> Result<ContainerResult, AdapterError> {
            Ok(ContainerResult { exit_code: self.exit_code, stdout: "ran".to_string(), stderr: String::new() })
        }
    }

    fn package_with_docker() -> PackageDescription {
        PackageDescription {
            class: "CommandLineTool".to_string(),
            base_command: Some(serde_json::json!("convert")),
            docker_pull: None,
            inputs: vec![{
                let mut io = PackageIo::new("input_file", PackageType::File);
                io.input_binding = Some(InputBinding { position: Some(1), prefix: Some("--input".to_string()) });
                io
            }],
            outputs: vec![{
                let mut io = PackageIo::new("converted", PackageType::File);
                io.output_binding = Some(OutputBinding { glob: Some("*.out".to_string()) });
                io
            }],
            steps: Default::default(),
            requirements: vec![serde_json::json!({"class": "DockerRequirement", "dockerPull": "example/convert:latest"})],
        }
    }

    #[tokio::test]
    async fn dispatch_renders_prefixed_args_in_position_order() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = LocalContainerAdapter::new(StubRunner { exit_code: 0 }, package_with_docker(), dir.path().to_path_buf());
        let inputs = vec![IoEntry { id: "input_file".to_string(), value: IoValue::Href { href: "file:///a.nc".to_string(), mime_type: None } }];
        let handle = adapter.dispatch(&inputs, &[]).await.unwrap();
        let spec = handle.0.downcast_ref::<ContainerSpec>().unwrap();
        assert_eq!(spec.image, "example/convert:latest");
        assert_eq!(spec.args, vec!["convert", "--input", "file:///a.nc"]);
    }

    #[tokio::test]
    async fn monitor_writes_stdout_log_and_reports_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = LocalContainerAdapter::new(StubRunner { exit_code: 0 }, package_with_docker(), dir.path().to_path_buf());
        let handle = adapter.dispatch(&[], &[]).await.unwrap();
        let sink = NullProgressSink;
        let cancel = CancellationToken::new();
        let success = adapter.monitor(&handle, &sink, &cancel).await.unwrap();
        assert!(success);
        assert!(dir.path().join("stdout.log").exists());
    }

    #[tokio::test]
    async fn nonzero_exit_code_is_reported_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = LocalContainerAdapter::new(StubRunner { exit_code: 1 }, package_with_docker(), dir.path().to_path_buf());
        let handle = adapter.dispatch(&[], &[]).await.unwrap();
        let sink = NullProgressSink;
        let cancel = CancellationToken::new();
        let success = adapter.monitor(&handle, &sink, &cancel).await.unwrap();
        assert!(!success);
    }

    #[tokio::test]
    async fn get_results_discovers_glob_output_and_synthetic_stdout() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("result.out"), "data").unwrap();
        let adapter = LocalContainerAdapter::new(StubRunner { exit_code: 0 }, package_with_docker(), dir.path().to_path_buf());
        let handle = adapter.dispatch(&[], &[]).await.unwrap();
        let results = adapter.get_results(&handle).await.unwrap();
        assert!(results.iter().any(|r| r.id == "stdout"));
        assert!(results.iter().any(|r| r.id == "converted"));
    }

    #[test]
    fn glob_matches_single_star_patterns() {
        assert!(glob_match("*.out", "result.out"));
        assert!(!glob_match("*.out", "result.log"));
        assert!(glob_match("stdout.log", "stdout.log"));
    }
}
