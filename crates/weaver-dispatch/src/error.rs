use thiserror::Error;

/// Errors raised by a remote process adapter. Distinguished from
/// `weaver_contracts::WeaverError` because an adapter failure is not
/// necessarily a job failure — the engine decides how to fold these into the
/// job's exception/status-message fields.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("transport error contacting {service}: {detail}")]
    Transport { service: String, detail: String },

    #[error("remote service {service} responded with an unexpected status {status}: {detail}")]
    UnexpectedStatus { service: String, status: u16, detail: String },

    #[error("could not parse {what} response from {service}: {detail}")]
    Malformed { service: String, what: String, detail: String },

    #[error("{service} reported job failure: {message}")]
    RemoteJobFailed { service: String, message: String },

    #[error("{attempts} consecutive soft failures polling {service}, giving up")]
    PollingExhausted { service: String, attempts: u32 },

    #[error("circuit open for {service}, dispatch short-circuited")]
    CircuitOpen { service: String },

    #[error("staging error: {0}")]
    Staging(#[from] weaver_staging::StagingError),

    #[error("{requirement} is not a supported execution unit requirement")]
    UnsupportedRequirement { requirement: String },

    #[error("job was cancelled")]
    Cancelled,
}
