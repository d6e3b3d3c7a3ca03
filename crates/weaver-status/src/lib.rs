//! Renders the two views of job state the external interfaces expose: the
//! OGC API — Processes JSON status document and the legacy WPS 1.0/2.0 XML
//! `ExecuteResponse`, plus the on-disk status/log file writer.

pub mod error;
pub mod file_writer;
pub mod json;
pub mod xml;

pub use error::StatusError;
pub use file_writer::StatusBridge;
pub use json::{build_status_document, Link, StatusDocument};
pub use xml::render_execute_response;
