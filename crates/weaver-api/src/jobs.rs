//! `POST /processes/{id}/execution` (and its legacy `/processes/{id}/jobs`
//! alias) plus the `GET /jobs/{id}` family — job submission, polling, and
//! dismissal, per the external interfaces table.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use weaver_contracts::error::ErrorCode;
use weaver_contracts::io::{IoEntry, IoValue};
use weaver_contracts::{Exception, LogLine, WeaverError};
use weaver_status::build_status_document;

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/processes/:id/execution", post(submit_job))
        .route("/processes/:id/jobs", post(submit_job))
        .route("/jobs/:id", get(get_job_status).delete(dismiss_job))
        .route("/jobs/:id/results", get(get_job_results))
        .route("/jobs/:id/outputs", get(get_job_outputs))
        .route("/jobs/:id/exceptions", get(get_job_exceptions))
        .route("/jobs/:id/logs", get(get_job_logs))
        .with_state(state)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ExecuteInput {
    pub id: String,
    pub href: Option<String>,
    pub value: Option<serde_json::Value>,
    #[serde(rename = "type")]
    pub type_: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ExecuteOutput {
    pub id: String,
    pub transmission_mode: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub inputs: Vec<ExecuteInput>,
    #[serde(default)]
    pub outputs: Vec<ExecuteOutput>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitJobResponse {
    #[serde(rename = "jobID")]
    pub job_id: String,
    pub status: String,
    pub location: String,
}

fn input_to_entry(input: ExecuteInput) -> Result<IoEntry, ApiError> {
    let value = match (input.href, input.value) {
        (Some(href), _) => IoValue::Href { href, mime_type: input.type_ },
        (None, Some(value)) => IoValue::Value { value },
        (None, None) => {
            return Err(ApiError(WeaverError::new(
                ErrorCode::PayloadNotFound,
                format!("input `{}` carries neither href nor value", input.id),
            )))
        }
    };
    Ok(IoEntry { id: input.id, value })
}

#[utoipa::path(
    post,
    path = "/processes/{id}/execution",
    request_body = ExecuteRequest,
    responses((status = 201, body = SubmitJobResponse), (status = 404)),
    tag = "jobs"
)]
pub async fn submit_job(
    State(state): State<AppState>,
    Path(process_id): Path<String>,
    Json(req): Json<ExecuteRequest>,
) -> Result<(StatusCode, HeaderMap, Json<SubmitJobResponse>), ApiError> {
    let process = state.process_store.fetch_by_id(&process_id).await?;

    let execute_async = !matches!(req.mode.as_deref(), Some("sync"));
    let is_workflow = matches!(process.kind, weaver_contracts::ProcessKind::Workflow);

    let mut job = weaver_contracts::Job::new(process.id.clone(), execute_async, is_workflow);
    job.inputs = req
        .inputs
        .into_iter()
        .map(input_to_entry)
        .collect::<Result<Vec<_>, _>>()?;

    let job_id = job.id;
    state.job_store.save_job(job).await?;
    state.spawn_execution(job_id);

    let location = format!("{}/jobs/{job_id}", state.config.wps_url.trim_end_matches('/'));
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&location) {
        headers.insert(axum::http::header::LOCATION, value);
    }

    Ok((
        StatusCode::CREATED,
        headers,
        Json(SubmitJobResponse { job_id: job_id.to_string(), status: "accepted".to_string(), location }),
    ))
}

fn parse_job_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id)
        .map_err(|_| ApiError(WeaverError::new(ErrorCode::JobNotFound, format!("`{id}` is not a valid job id"))))
}

#[utoipa::path(get, path = "/jobs/{id}", responses((status = 200, body = weaver_status::StatusDocument), (status = 404)), tag = "jobs")]
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<weaver_status::StatusDocument>, ApiError> {
    let job_id = parse_job_id(&id)?;
    let job = state.job_store.fetch_by_id(job_id).await?;
    let base_url = format!("{}/jobs/{job_id}", state.config.wps_url.trim_end_matches('/'));
    Ok(Json(build_status_document(&job, &base_url, &base_url)))
}

#[derive(Debug, Serialize)]
pub struct ResultsDocument {
    pub outputs: Vec<IoEntry>,
}

#[utoipa::path(get, path = "/jobs/{id}/results", responses((status = 200), (status = 404)), tag = "jobs")]
pub async fn get_job_results(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ResultsDocument>, ApiError> {
    let job_id = parse_job_id(&id)?;
    let job = state.job_store.fetch_by_id(job_id).await?;
    if job.status != weaver_contracts::JobStatus::Succeeded {
        return Err(ApiError(WeaverError::new(
            ErrorCode::PackageExecutionError,
            format!("job {job_id} has not succeeded (status: {})", job.status),
        )));
    }
    Ok(Json(ResultsDocument { outputs: job.results }))
}

#[utoipa::path(get, path = "/jobs/{id}/outputs", responses((status = 200), (status = 404)), tag = "jobs")]
pub async fn get_job_outputs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<IoEntry>>, ApiError> {
    let job_id = parse_job_id(&id)?;
    let job = state.job_store.fetch_by_id(job_id).await?;
    Ok(Json(job.results))
}

#[utoipa::path(get, path = "/jobs/{id}/exceptions", responses((status = 200, body = Vec<Exception>), (status = 404)), tag = "jobs")]
pub async fn get_job_exceptions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Exception>>, ApiError> {
    let job_id = parse_job_id(&id)?;
    let job = state.job_store.fetch_by_id(job_id).await?;
    Ok(Json(job.exceptions))
}

#[utoipa::path(get, path = "/jobs/{id}/logs", responses((status = 200, body = Vec<LogLine>), (status = 404)), tag = "jobs")]
pub async fn get_job_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<LogLine>>, ApiError> {
    let job_id = parse_job_id(&id)?;
    let job = state.job_store.fetch_by_id(job_id).await?;
    Ok(Json(job.logs))
}

/// Best-effort dismissal: cancels the in-flight adapter via the worker pool
/// (if still running) and transitions the job record directly when it is
/// still in `Accepted` — the running case is left to the engine's own
/// `dismiss_job` path once it observes the cancellation token.
#[utoipa::path(delete, path = "/jobs/{id}", responses((status = 200), (status = 404)), tag = "jobs")]
pub async fn dismiss_job(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    let job_id = parse_job_id(&id)?;
    let mut job = state.job_store.fetch_by_id(job_id).await?;

    state.pool.cancel_job(job_id);

    if job.status == weaver_contracts::JobStatus::Accepted {
        job.transition(weaver_contracts::JobStatus::Dismissed)?;
        job.push_log(LogLine::new("INFO", "weaver-api", "job dismissed before execution started"));
        state.job_store.update_job(job).await?;
    }

    Ok(StatusCode::OK)
}
