use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Machine-readable error discriminant, stable across crate versions.
///
/// Mirrors the error taxonomy table: each kind has one documented HTTP
/// surfacing rule and, where relevant, one job-state surfacing rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub enum ErrorCode {
    PackageRegistrationError,
    PackageTypeError,
    PackageNotFound,
    PayloadNotFound,
    PackageExecutionError,
    ProcessNotFound,
    ServiceRegistrationError,
    JobNotFound,
    AccessTokenNotFound,
    NetworkTransient,
    NotImplemented,
}

impl ErrorCode {
    /// The HTTP status this kind is surfaced as when it escapes to the API layer.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorCode::PackageRegistrationError
            | ErrorCode::PackageTypeError => 400,
            ErrorCode::PackageNotFound
            | ErrorCode::PayloadNotFound
            | ErrorCode::ProcessNotFound
            | ErrorCode::JobNotFound => 404,
            ErrorCode::PackageExecutionError => 500,
            ErrorCode::ServiceRegistrationError => 409,
            ErrorCode::AccessTokenNotFound => 401,
            ErrorCode::NetworkTransient => 502,
            ErrorCode::NotImplemented => 501,
        }
    }
}

/// A typed error carrying a human message, a machine code, and an optional
/// locator (the offending field path, step name, or job id).
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("{code:?}: {message}")]
pub struct WeaverError {
    pub code: ErrorCode,
    pub message: String,
    pub locator: Option<String>,
}

impl WeaverError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), locator: None }
    }

    pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
        self.locator = Some(locator.into());
        self
    }
}
