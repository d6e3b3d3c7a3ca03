use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use weaver_contracts::error::ErrorCode;
use weaver_contracts::WeaverError;

/// The JSON error envelope every handler failure renders as, per the error
/// taxonomy's "human message, machine code, optional locator" shape.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: ErrorCode,
    message: String,
    locator: Option<String>,
}

/// Newtype so handlers can `?`-propagate any collaborator error and have it
/// land on the right HTTP status via `ErrorCode::http_status`.
#[derive(Debug)]
pub struct ApiError(pub WeaverError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody { code: self.0.code, message: self.0.message, locator: self.0.locator };
        (status, Json(body)).into_response()
    }
}

impl From<WeaverError> for ApiError {
    fn from(err: WeaverError) -> Self {
        Self(err)
    }
}

impl From<weaver_storage::StoreError> for ApiError {
    fn from(err: weaver_storage::StoreError) -> Self {
        use weaver_storage::StoreError::*;
        let code = match &err {
            JobNotFound(_) => ErrorCode::JobNotFound,
            ProcessNotFound(_) => ErrorCode::ProcessNotFound,
            ServiceNotFound(_) | ServiceUrlConflict(_) | ServiceNameConflict(_) => ErrorCode::ServiceRegistrationError,
            ProcessAlreadyExists(_) => ErrorCode::PackageRegistrationError,
            Backend(_) => ErrorCode::PackageExecutionError,
        };
        Self(WeaverError::new(code, err.to_string()))
    }
}

impl From<weaver_package::PackageError> for ApiError {
    fn from(err: weaver_package::PackageError) -> Self {
        use weaver_package::PackageError::*;
        let code = match &err {
            UnsupportedExtension(_) | ParseError(_) | UnknownClass(_) | Cycle(_) => ErrorCode::PackageRegistrationError,
            Fetch { .. } => ErrorCode::PackageNotFound,
        };
        Self(WeaverError::new(code, err.to_string()))
    }
}

impl From<weaver_io::ConvertError> for ApiError {
    fn from(err: weaver_io::ConvertError) -> Self {
        Self(WeaverError::new(ErrorCode::PackageTypeError, err.to_string()))
    }
}

impl From<weaver_staging::StagingError> for ApiError {
    fn from(err: weaver_staging::StagingError) -> Self {
        let code = match &err {
            weaver_staging::StagingError::InvalidOutputContext(_) => ErrorCode::PackageRegistrationError,
            _ => ErrorCode::PackageExecutionError,
        };
        Self(WeaverError::new(code, err.to_string()))
    }
}

pub fn not_found(code: ErrorCode, message: impl Into<String>) -> ApiError {
    ApiError(WeaverError::new(code, message))
}
