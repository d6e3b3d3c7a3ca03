use thiserror::Error;
use weaver_contracts::WeaverError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("package error: {0}")]
    Package(#[from] weaver_package::PackageError),

    #[error("store error: {0}")]
    Store(#[from] weaver_storage::StoreError),

    #[error("adapter error: {0}")]
    Adapter(#[from] weaver_dispatch::AdapterError),

    #[error("staging error: {0}")]
    Staging(#[from] weaver_staging::StagingError),

    #[error("status error: {0}")]
    Status(#[from] weaver_status::StatusError),

    #[error("job error: {0}")]
    Job(#[from] WeaverError),

    #[error("io error: {path}: {detail}")]
    Io { path: String, detail: String },

    #[error("{requirement} is not a supported execution unit requirement")]
    NotImplemented { requirement: String },
}

impl From<EngineError> for WeaverError {
    fn from(err: EngineError) -> Self {
        use weaver_contracts::error::ErrorCode;
        let code = match &err {
            EngineError::NotImplemented { .. } => ErrorCode::NotImplemented,
            EngineError::Store(weaver_storage::StoreError::JobNotFound(_)) => ErrorCode::JobNotFound,
            EngineError::Job(inner) => inner.code,
            _ => ErrorCode::PackageExecutionError,
        };
        WeaverError::new(code, err.to_string())
    }
}
