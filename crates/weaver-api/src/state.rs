use std::sync::Arc;
use std::time::Duration;

use weaver_dispatch::DataSources;
use weaver_engine::{DefaultAdapterFactory, EngineWorkerPool, ExecutionEngine, ExecutionMode};
use weaver_package::{HttpPackageFetcher, PackageCache, PackageFetcher};
use weaver_staging::StagingConfig;
use weaver_status::StatusBridge;
use weaver_storage::{InMemoryJobStore, InMemoryProcessStore, InMemoryServiceStore, JobStore, ProcessStore, ServiceStore};

/// Process-wide configuration read from the `wps.*`/`configuration`
/// environment variables named in the external interfaces table.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub wps_url: String,
    pub wps_path: String,
    pub bind_addr: String,
    pub mode: ExecutionMode,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let mode = match std::env::var("CONFIGURATION").ok().as_deref() {
            Some("EMS") => ExecutionMode::Ems,
            _ => ExecutionMode::Ades,
        };
        Self {
            wps_url: std::env::var("WPS_URL").unwrap_or_else(|_| "http://localhost:8000".to_string()),
            wps_path: std::env::var("WPS_PATH").unwrap_or_else(|_| "/ows/wps".to_string()),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string()),
            mode,
        }
    }
}

/// Shared application state, handed to every handler module as `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub job_store: Arc<dyn JobStore>,
    pub process_store: Arc<dyn ProcessStore>,
    pub service_store: Arc<dyn ServiceStore>,
    pub staging_config: Arc<StagingConfig>,
    pub status_bridge: Arc<StatusBridge>,
    pub data_sources: Arc<DataSources>,
    pub package_fetcher: Arc<dyn PackageFetcher>,
    pub engine: Arc<ExecutionEngine>,
    pub pool: Arc<EngineWorkerPool>,
}

impl AppState {
    /// Assembles the default, in-memory-backed state the binary runs with.
    /// A `postgres`-feature build would swap the three `InMemory*` stores
    /// for `weaver_storage::Postgres*` equivalents behind the same traits;
    /// every other collaborator is unaffected.
    pub fn from_env() -> anyhow::Result<Self> {
        let config = Arc::new(ApiConfig::from_env());
        let staging_config = Arc::new(StagingConfig::from_env());
        let client = reqwest::Client::new();

        let data_sources = Arc::new(match std::env::var("DATA_SOURCES") {
            Ok(path) => {
                let body = std::fs::read_to_string(&path)
                    .map_err(|e| anyhow::anyhow!("failed to read data_sources file {path}: {e}"))?;
                DataSources::from_json(&body)?
            }
            Err(_) => DataSources::default(),
        });

        let package_cache = Arc::new(PackageCache::new(Duration::from_secs(60)));
        let local_processes_base = format!("{}/processes", config.wps_url.trim_end_matches('/'));
        let package_fetcher: Arc<dyn PackageFetcher> =
            Arc::new(HttpPackageFetcher::new(client.clone(), package_cache, local_processes_base));

        let job_store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
        let process_store: Arc<dyn ProcessStore> = Arc::new(InMemoryProcessStore::new());
        let service_store: Arc<dyn ServiceStore> = Arc::new(InMemoryServiceStore::new());

        let status_bridge = Arc::new(StatusBridge::new(
            staging_config.output_dir.clone(),
            staging_config.output_url.clone(),
        ));

        let adapter_factory = Arc::new(DefaultAdapterFactory::new(
            client.clone(),
            data_sources.clone(),
            format!("{}/processes", config.wps_url.trim_end_matches('/')),
        ));

        let engine = Arc::new(ExecutionEngine::new(
            job_store.clone(),
            process_store.clone(),
            status_bridge.clone(),
            staging_config.clone(),
            adapter_factory,
            package_fetcher.clone(),
            client,
            config.mode,
        ));

        Ok(Self {
            config,
            job_store,
            process_store,
            service_store,
            staging_config,
            status_bridge,
            data_sources,
            package_fetcher,
            engine,
            pool: Arc::new(EngineWorkerPool::with_default_capacity()),
        })
    }

    /// Dispatches `job_id` onto the worker pool, letting the caller's HTTP
    /// handler return as soon as the job record is persisted. Matches the
    /// per-job single-writer discipline: only the spawned task touches the
    /// job record from here on.
    pub fn spawn_execution(&self, job_id: uuid::Uuid) {
        let engine = self.engine.clone();
        let pool = self.pool.clone();
        tokio::spawn(async move {
            pool.clone()
                .spawn_job(job_id, move |cancel| async move {
                    if let Err(err) = engine.execute_job(job_id, cancel).await {
                        tracing::error!(job_id = %job_id, error = %err, "execution engine failed outside job-level error handling");
                    }
                    pool.finish_job(job_id);
                })
                .await;
        });
    }
}
