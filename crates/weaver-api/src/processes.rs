//! `GET/POST /processes`, `GET /processes/{id}` — the deploy and describe
//! surface of OGC API — Processes. Deployment classifies the submitted
//! package (§4.2), normalizes its I/O against any WPS-declared I/O the
//! deployment payload carries (§4.1 `merge`), and validates that every
//! declared default conforms to its allowed values before the process is
//! ever persisted (S5).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use weaver_contracts::error::ErrorCode;
use weaver_contracts::io::{ApiIo, IoDirection, WpsIo};
use weaver_contracts::{Process, ProcessKind, Visibility, WeaverError};
use weaver_io::{merge, package_to_wps, wps_to_api};
use weaver_package::model::parse_package;

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/processes", get(list_processes).post(deploy_process))
        .route("/processes/:id", get(describe_process).delete(undeploy_process))
        .with_state(state)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ExecutionUnit {
    pub unit: Option<serde_json::Value>,
    pub href: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ProcessDescriptionPayload {
    pub id: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub version: Option<String>,
    /// Deployment carries full WPS-dialect I/O (not the stripped-down API
    /// JSON shape) so a user can declare `allowedValues`/`keywords` that
    /// `merge` is able to preserve over the package-derived values below.
    #[serde(default)]
    pub inputs: Vec<WpsIo>,
    #[serde(default)]
    pub outputs: Vec<WpsIo>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeployRequest {
    pub process_description: ProcessDescriptionPayload,
    pub execution_unit: Vec<ExecutionUnit>,
    pub deployment_profile_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProcessSummary {
    pub id: String,
    pub title: Option<String>,
    pub version: Option<String>,
    pub visibility: Visibility,
}

impl From<&Process> for ProcessSummary {
    fn from(p: &Process) -> Self {
        Self { id: p.id.clone(), title: p.title.clone(), version: p.version.clone(), visibility: p.visibility }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListProcessesQuery {
    pub visibility: Option<String>,
}

#[utoipa::path(get, path = "/processes", responses((status = 200, body = Vec<ProcessSummary>)), tag = "processes")]
pub async fn list_processes(
    State(state): State<AppState>,
    Query(query): Query<ListProcessesQuery>,
) -> Result<Json<Vec<ProcessSummary>>, ApiError> {
    let visibility = match query.visibility.as_deref() {
        Some("public") => Some(Visibility::Public),
        Some("private") => Some(Visibility::Private),
        _ => None,
    };
    let processes = state.process_store.list_processes(visibility).await?;
    Ok(Json(processes.iter().map(ProcessSummary::from).collect()))
}

/// Fetches the deployment's single execution unit body: inline (`unit`) wins
/// over a remote reference (`href`), matching the original's preference for
/// an already-available description over a network round trip.
async fn load_package_body(
    state: &AppState,
    unit: &ExecutionUnit,
) -> Result<weaver_package::PackageDescription, ApiError> {
    if let Some(inline) = &unit.unit {
        let body = serde_json::to_string(inline).map_err(|e| {
            ApiError(WeaverError::new(ErrorCode::PackageRegistrationError, format!("inline execution unit is not valid JSON: {e}")))
        })?;
        return Ok(parse_package(None, &body)?);
    }
    if let Some(href) = &unit.href {
        return Ok(state.package_fetcher.fetch(href).await?);
    }
    Err(ApiError(WeaverError::new(
        ErrorCode::PayloadNotFound,
        "executionUnit must carry either `unit` or `href`",
    )))
}

/// Validates that every declared default value is a member of that input's
/// `allowedValues`, when the input declares any — deployment fails before
/// any job can ever reference this process (S5).
fn validate_defaults(package: &weaver_package::PackageDescription) -> Result<(), ApiError> {
    for input in &package.inputs {
        if input.allowed_values.is_empty() {
            continue;
        }
        if let Some(default) = &input.default {
            if !input.allowed_values.contains(default) {
                return Err(ApiError(
                    WeaverError::new(
                        ErrorCode::PackageTypeError,
                        format!("default value for input `{}` is not one of its allowed values", input.id),
                    )
                    .with_locator(input.id.clone()),
                ));
            }
        }
    }
    Ok(())
}

#[utoipa::path(
    post,
    path = "/processes",
    request_body = DeployRequest,
    responses((status = 201, body = ProcessSummary), (status = 400)),
    tag = "processes"
)]
pub async fn deploy_process(
    State(state): State<AppState>,
    Json(req): Json<DeployRequest>,
) -> Result<(StatusCode, Json<ProcessSummary>), ApiError> {
    let unit = req.execution_unit.first().ok_or_else(|| {
        ApiError(WeaverError::new(ErrorCode::PayloadNotFound, "deployment requires at least one executionUnit"))
    })?;
    let package = load_package_body(&state, unit).await?;
    validate_defaults(&package)?;

    let class = package.classify()?;
    let kind = match class {
        weaver_package::PackageClass::Application => ProcessKind::Application,
        weaver_package::PackageClass::Workflow => ProcessKind::Workflow,
    };

    let id = req
        .process_description
        .id
        .clone()
        .unwrap_or_else(|| weaver_contracts::service::sane_name(&format!("process-{}", uuid::Uuid::new_v4())));

    let inputs = merge(&req.process_description.inputs, &package.inputs, IoDirection::Input)?;
    let outputs = merge(&req.process_description.outputs, &package.outputs, IoDirection::Output)?;

    let payload_raw = serde_json::to_value(&req.process_description).unwrap_or(serde_json::Value::Null);
    let package_raw = serde_json::to_value(&package).map_err(|e| {
        ApiError(WeaverError::new(ErrorCode::PackageRegistrationError, format!("package is not serializable: {e}")))
    })?;

    let process = Process {
        id: id.clone(),
        kind,
        package: package_raw,
        payload: payload_raw,
        inputs: inputs.into_iter().map(wps_io_to_package_io).collect(),
        outputs: outputs.into_iter().map(wps_io_to_package_io).collect(),
        title: req.process_description.title.clone(),
        abstract_: req.process_description.abstract_.clone(),
        keywords: req.process_description.keywords.clone(),
        version: req.process_description.version.clone(),
        metadata_links: Vec::new(),
        visibility: Visibility::Public,
    };

    state.process_store.create_process(process.clone()).await?;
    Ok((StatusCode::CREATED, Json(ProcessSummary::from(&process))))
}

/// `merge` returns the WPS dialect; the `Process` record stores package-
/// dialect I/O (per the data model), so the normalized result round-trips
/// back through a `PackageIo` carrying everything that dialect can express,
/// including the user-declared `allowedValues` a merge override may have won.
fn wps_io_to_package_io(io: WpsIo) -> weaver_contracts::io::PackageIo {
    let mut out = weaver_contracts::io::PackageIo::new(io.identifier, weaver_contracts::io::PackageType::Any);
    out.label = io.title;
    out.doc = io.abstract_;
    out.format = io.supported_formats;
    out.allowed_values = io.allowed_values;
    out
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProcessDescription {
    pub id: String,
    pub title: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_: Option<String>,
    pub keywords: Vec<String>,
    pub version: Option<String>,
    pub inputs: Vec<ApiIo>,
    pub outputs: Vec<ApiIo>,
}

#[utoipa::path(get, path = "/processes/{id}", responses((status = 200, body = ProcessDescription), (status = 404)), tag = "processes")]
pub async fn describe_process(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProcessDescription>, ApiError> {
    let process = state.process_store.fetch_by_id(&id).await?;

    let inputs = process
        .inputs
        .iter()
        .map(|io| wps_to_api(&package_to_wps(io, IoDirection::Input).unwrap_or_else(|_| fallback_wps_io(io))))
        .collect();
    let outputs = process
        .outputs
        .iter()
        .map(|io| wps_to_api(&package_to_wps(io, IoDirection::Output).unwrap_or_else(|_| fallback_wps_io(io))))
        .collect();

    Ok(Json(ProcessDescription {
        id: process.id,
        title: process.title,
        abstract_: process.abstract_,
        keywords: process.keywords,
        version: process.version,
        inputs,
        outputs,
    }))
}

fn fallback_wps_io(io: &weaver_contracts::io::PackageIo) -> weaver_contracts::io::WpsIo {
    weaver_contracts::io::WpsIo {
        identifier: io.id.clone(),
        title: io.label.clone(),
        abstract_: io.doc.clone(),
        kind: weaver_contracts::io::IoKind::Literal,
        data_type: Some("anyValue".to_string()),
        min_occurs: 1,
        max_occurs: 1,
        allowed_values: Vec::new(),
        supported_formats: io.format.clone(),
        mode: None,
        keywords: Vec::new(),
        metadata: Default::default(),
    }
}

#[utoipa::path(delete, path = "/processes/{id}", responses((status = 204), (status = 404)), tag = "processes")]
pub async fn undeploy_process(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    state.process_store.delete_process(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
