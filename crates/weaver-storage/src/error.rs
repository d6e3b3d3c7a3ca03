/// Errors raised by any `JobStore`/`ProcessStore`/`ServiceStore` implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("job not found: {0}")]
    JobNotFound(uuid::Uuid),

    #[error("process not found: {0}")]
    ProcessNotFound(String),

    #[error("service not found: {0}")]
    ServiceNotFound(String),

    #[error("process id already registered: {0}")]
    ProcessAlreadyExists(String),

    #[error("service url already registered: {0}")]
    ServiceUrlConflict(String),

    #[error("service name already registered: {0}")]
    ServiceNameConflict(String),

    #[error("backend error: {0}")]
    Backend(String),
}
