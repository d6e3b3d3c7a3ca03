use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use weaver_contracts::io::IoEntry;
use weaver_dispatch::{APIProcessesAdapter, DataSources, DockerCliContainerRunner, LocalContainerAdapter, RemoteProcess, WPS1Adapter};
use weaver_package::PlanStep;

use crate::error::EngineError;
use crate::select_adapter::AdapterKind;

/// Resolves an `AdapterKind` decision into a concrete, ready-to-run
/// `RemoteProcess`. Kept as a named-interface collaborator (rather than
/// constructing adapters inline in the engine) because building a
/// `LocalContainerAdapter` needs a `ContainerRunner`, building a `WPS1Adapter`
/// needs the step's resolved ADES endpoint, and building an
/// `APIProcessesAdapter` needs the resolved data source — none of which the
/// engine itself should know how to wire.
#[async_trait]
pub trait AdapterFactory: Send + Sync {
    /// `process_id` is the identifier this step is addressed by on its
    /// remote target: the job's own process id for the single synthetic
    /// step of an application, or the step name for a workflow step.
    /// `inputs` are the step's already-staged inputs, consulted only to
    /// resolve a data source by input URL (§4.3).
    async fn build(
        &self,
        kind: AdapterKind,
        step: &PlanStep,
        process_id: &str,
        inputs: &[IoEntry],
        workdir: PathBuf,
    ) -> Result<Box<dyn RemoteProcess>, EngineError>;
}

/// The factory wired by the ADES/EMS binary: a real `docker` CLI runner for
/// local steps, a bare reqwest client for the two remote dialects, and the
/// configured `DataSources` table for picking an API-Processes target.
pub struct DefaultAdapterFactory {
    client: reqwest::Client,
    data_sources: Arc<DataSources>,
    local_api_base: String,
}

impl DefaultAdapterFactory {
    pub fn new(client: reqwest::Client, data_sources: Arc<DataSources>, local_api_base: impl Into<String>) -> Self {
        Self { client, data_sources, local_api_base: local_api_base.into() }
    }

    /// A `WPS1Requirement` names the remote endpoint to execute against;
    /// accepted either as `{class, href}` or `{class, process: {href}}`.
    fn wps1_endpoint(step: &PlanStep) -> Result<String, EngineError> {
        step.package
            .requirements
            .iter()
            .find(|r| r.get("class").and_then(|c| c.as_str()) == Some("WPS1Requirement"))
            .and_then(|r| {
                r.get("href")
                    .and_then(|v| v.as_str())
                    .or_else(|| r.get("process").and_then(|p| p.get("href")).and_then(|v| v.as_str()))
            })
            .map(str::to_string)
            .ok_or_else(|| EngineError::NotImplemented { requirement: "WPS1Requirement without an href".to_string() })
    }
}

#[async_trait]
impl AdapterFactory for DefaultAdapterFactory {
    async fn build(
        &self,
        kind: AdapterKind,
        step: &PlanStep,
        process_id: &str,
        inputs: &[IoEntry],
        workdir: PathBuf,
    ) -> Result<Box<dyn RemoteProcess>, EngineError> {
        match kind {
            AdapterKind::LocalContainer => {
                Ok(Box::new(LocalContainerAdapter::new(DockerCliContainerRunner, step.package.clone(), workdir)))
            }
            AdapterKind::Wps1 => {
                let endpoint = Self::wps1_endpoint(step)?;
                Ok(Box::new(WPS1Adapter::new(self.client.clone(), endpoint, process_id.to_string(), true)))
            }
            AdapterKind::ApiProcesses => {
                let source = inputs
                    .iter()
                    .find_map(|entry| entry.value.href().and_then(|href| self.data_sources.resolve_by_url(href)))
                    .or_else(|| self.data_sources.default_source());
                let base = self.data_sources.resolve_to_ades(source, &self.local_api_base);
                Ok(Box::new(APIProcessesAdapter::new(self.client.clone(), base, process_id.to_string())))
            }
        }
    }
}
