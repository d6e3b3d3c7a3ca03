//! Resolves input URLs to configured data sources and dispatches workflow
//! steps to one of three remote process adapters (local container, WPS-1,
//! OGC API — Processes), publishing a fixed progress schedule as each step
//! advances.

pub mod api_adapter;
pub mod docker_runner;
pub mod error;
pub mod local_adapter;
pub mod progress;
pub mod remote_process;
pub mod retry;
pub mod sources;
pub mod wps1_adapter;

pub use api_adapter::APIProcessesAdapter;
pub use docker_runner::DockerCliContainerRunner;
pub use error::AdapterError;
pub use local_adapter::{ContainerRunner, ContainerSpec, LocalContainerAdapter};
pub use remote_process::{DispatchHandle, NullProgressSink, ProgressSink, RemoteProcess};
pub use retry::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use sources::{DataSources, SourceEntry};
pub use wps1_adapter::WPS1Adapter;
