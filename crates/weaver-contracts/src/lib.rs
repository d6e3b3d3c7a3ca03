//! Shared data transfer objects for the workflow execution management service.
//!
//! Everything here is a plain, serde-friendly value type with no I/O of its own;
//! the store, staging, dispatch and engine crates all exchange values defined here.

pub mod error;
pub mod io;
pub mod job;
pub mod process;
pub mod service;

pub use error::{ErrorCode, WeaverError};
pub use io::{IoDirection, IoKind, IoValue, PackageIo, PackageType};
pub use job::{ExecuteMode, Exception, Job, JobStatus, LogLine, Visibility};
pub use process::{Process, ProcessKind};
pub use service::{AuthMode, Service, ServiceType};
