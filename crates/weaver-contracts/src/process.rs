use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::io::PackageIo;
use crate::job::Visibility;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProcessKind {
    Application,
    Workflow,
}

/// A durable record of a deployable unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Process {
    pub id: String,
    pub kind: ProcessKind,
    /// The full package description, stored opaquely (searchable via `package_raw`).
    pub package: serde_json::Value,
    /// The original deployment request envelope, as submitted.
    pub payload: serde_json::Value,
    pub inputs: Vec<PackageIo>,
    pub outputs: Vec<PackageIo>,
    pub title: Option<String>,
    pub abstract_: Option<String>,
    pub keywords: Vec<String>,
    pub version: Option<String>,
    pub metadata_links: Vec<String>,
    pub visibility: Visibility,
}

impl Process {
    /// Escapes `$` and `.` so the document survives stores that reject them
    /// in a key (e.g. a document store indexing on the process id).
    pub fn escape_key(key: &str) -> String {
        key.replace('$', "\u{ff04}").replace('.', "\u{ff0e}")
    }

    pub fn unescape_key(key: &str) -> String {
        key.replace('\u{ff04}', "$").replace('\u{ff0e}', ".")
    }
}
