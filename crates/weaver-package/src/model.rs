use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use weaver_contracts::io::PackageIo;

const SUPPORTED_EXTENSIONS: &[&str] = &["yaml", "yml", "json", "cwl", "job"];

#[derive(Debug, Clone, thiserror::Error)]
pub enum PackageError {
    #[error("unsupported package file extension: {0}")]
    UnsupportedExtension(String),
    #[error("failed to parse package body: {0}")]
    ParseError(String),
    #[error("package class must be CommandLineTool or Workflow, got: {0}")]
    UnknownClass(String),
    #[error("cycle detected while resolving workflow step references: {0}")]
    Cycle(String),
    #[error("failed to fetch remote package {url}: {detail}")]
    Fetch { url: String, detail: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageClass {
    Application,
    Workflow,
}

/// A reference to another package from a workflow step: either a local
/// `<name>.cwl` file (the step name becomes `<name>`) or a URL, in which case
/// the loader must fetch `<url>/package` for a nested description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunRef {
    Local(String),
    Url(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StepSource {
    pub run: String,
    #[serde(default)]
    pub r#in: HashMap<String, String>,
    #[serde(default)]
    pub out: Vec<String>,
}

/// The raw, parsed shape of a package description, before plan resolution.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PackageDescription {
    pub class: String,
    #[serde(default, rename = "baseCommand")]
    pub base_command: Option<serde_json::Value>,
    #[serde(default)]
    pub docker_pull: Option<String>,
    #[serde(default)]
    pub inputs: Vec<PackageIo>,
    #[serde(default)]
    pub outputs: Vec<PackageIo>,
    #[serde(default)]
    pub steps: HashMap<String, StepSource>,
    #[serde(default)]
    pub requirements: Vec<serde_json::Value>,
}

impl PackageDescription {
    pub fn classify(&self) -> Result<PackageClass, PackageError> {
        match self.class.as_str() {
            "Workflow" => Ok(PackageClass::Workflow),
            "CommandLineTool" => Ok(PackageClass::Application),
            other => Err(PackageError::UnknownClass(other.to_string())),
        }
    }

    pub fn has_requirement(&self, type_name: &str) -> bool {
        self.requirements.iter().any(|r| {
            r.get("class").and_then(|c| c.as_str()) == Some(type_name)
        })
    }
}

/// Checks that the source's file extension (when known) is one this loader
/// accepts, then parses with a YAML parser — which accepts JSON as a subset
/// — regardless of the declared extension.
pub fn parse_package(extension: Option<&str>, body: &str) -> Result<PackageDescription, PackageError> {
    if let Some(ext) = extension {
        if !SUPPORTED_EXTENSIONS.contains(&ext) {
            return Err(PackageError::UnsupportedExtension(ext.to_string()));
        }
    }
    serde_yaml::from_str(body).map_err(|e| PackageError::ParseError(e.to_string()))
}

pub fn run_ref(run: &str) -> RunRef {
    if run.starts_with("http://") || run.starts_with("https://") {
        RunRef::Url(run.to_string())
    } else {
        RunRef::Local(
            run.strip_suffix(".cwl")
                .unwrap_or(run)
                .trim_start_matches("./")
                .to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_extension() {
        let err = parse_package(Some("txt"), "{}").unwrap_err();
        assert!(matches!(err, PackageError::UnsupportedExtension(_)));
    }

    #[test]
    fn parses_json_via_yaml_parser() {
        let body = r#"{"class": "CommandLineTool", "inputs": [], "outputs": []}"#;
        let pkg = parse_package(Some("json"), body).unwrap();
        assert_eq!(pkg.classify().unwrap(), PackageClass::Application);
    }

    #[test]
    fn unknown_class_is_an_error() {
        let body = "class: ExpressionTool";
        let pkg = parse_package(Some("yaml"), body).unwrap();
        assert!(pkg.classify().is_err());
    }

    #[test]
    fn run_ref_distinguishes_local_and_url() {
        assert_eq!(run_ref("step_one.cwl"), RunRef::Local("step_one".to_string()));
        assert_eq!(
            run_ref("https://ades.example.com/processes/p1"),
            RunRef::Url("https://ades.example.com/processes/p1".to_string())
        );
    }
}
