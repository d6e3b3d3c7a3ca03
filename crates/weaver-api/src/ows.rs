//! The legacy WPS 1.0/2.0 `/ows/wps` endpoint: KVP `GET` and XML `POST`
//! `Execute` requests, content-negotiated between the XML `ExecuteResponse`
//! and the OGC API — Processes JSON status document via `Accept`.

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;

use weaver_contracts::error::ErrorCode;
use weaver_contracts::io::{IoEntry, IoValue};
use weaver_contracts::{Job, ProcessKind, WeaverError};
use weaver_status::{build_status_document, render_execute_response};

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new().route("/ows/wps", get(execute_kvp).post(execute_xml)).with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct WpsKvpQuery {
    pub service: Option<String>,
    pub request: Option<String>,
    pub version: Option<String>,
    pub identifier: Option<String>,
    #[serde(rename = "DataInputs")]
    pub data_inputs: Option<String>,
}

/// Parses the `id=value[@mimeType=...];id2=value2` `DataInputs` encoding
/// shared with the outbound `WPS1Adapter`'s KVP renderer. A value is treated
/// as an `href` when it parses as an absolute URL, else as a literal.
fn parse_data_inputs(raw: &str) -> Vec<IoEntry> {
    raw.split(';')
        .filter(|s| !s.is_empty())
        .filter_map(|entry| {
            let (id, rest) = entry.split_once('=')?;
            let mut parts = rest.split('@');
            let value = parts.next().unwrap_or("").to_string();
            let mut mime_type = None;
            for attr in parts {
                if let Some(m) = attr.strip_prefix("mimeType=") {
                    mime_type = Some(m.to_string());
                }
            }
            let io_value = if url::Url::parse(&value).is_ok() {
                IoValue::Href { href: value, mime_type }
            } else {
                IoValue::Value { value: serde_json::Value::String(value) }
            };
            Some(IoEntry { id: id.to_string(), value: io_value })
        })
        .collect()
}

/// Renders either the WPS XML `ExecuteResponse` or the OGC API JSON status
/// document for a freshly submitted job, per the `Accept` header.
async fn respond(state: &AppState, job: &Job, headers: &HeaderMap) -> Result<Response, ApiError> {
    let wants_json = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|accept| accept.contains("application/json"))
        .unwrap_or(false);

    if wants_json {
        let base_url = format!("{}/jobs/{}", state.config.wps_url.trim_end_matches('/'), job.id);
        let doc = build_status_document(job, &base_url, &base_url);
        return Ok((StatusCode::OK, axum::Json(doc)).into_response());
    }

    let status_location = format!(
        "{}/{}.xml",
        state.staging_config.output_url.trim_end_matches('/'),
        job.id
    );
    let xml = render_execute_response(job, &status_location)
        .map_err(|e| ApiError(WeaverError::new(ErrorCode::PackageExecutionError, e.to_string())))?;
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "text/xml")], xml).into_response())
}

async fn submit_wps1_job(state: &AppState, identifier: &str, inputs: Vec<IoEntry>) -> Result<Job, ApiError> {
    let process = state.process_store.fetch_by_id(identifier).await?;
    let is_workflow = matches!(process.kind, ProcessKind::Workflow);

    let mut job = Job::new(process.id, true, is_workflow);
    job.inputs = inputs;

    let job_id = job.id;
    state.job_store.save_job(job.clone()).await?;
    state.spawn_execution(job_id);
    Ok(job)
}

/// `GET /ows/wps?service=WPS&request=Execute&version=1.0.0&identifier=<id>&DataInputs=...`
pub async fn execute_kvp(
    State(state): State<AppState>,
    Query(query): Query<WpsKvpQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if !matches!(query.request.as_deref(), Some("Execute") | Some("execute")) {
        return Err(ApiError(WeaverError::new(
            ErrorCode::NotImplemented,
            "only the Execute request is supported on /ows/wps",
        )));
    }
    let identifier = query.identifier.ok_or_else(|| {
        ApiError(WeaverError::new(ErrorCode::PayloadNotFound, "Execute requires an `identifier` parameter"))
    })?;
    let inputs = query.data_inputs.map(|raw| parse_data_inputs(&raw)).unwrap_or_default();

    let job = submit_wps1_job(&state, &identifier, inputs).await?;
    respond(&state, &job, &headers).await
}

/// `POST /ows/wps` with an Execute request body (WPS 2.0 XML encoding).
/// The full XML Execute schema is not parsed here; the request must still
/// carry `identifier` and `DataInputs` as query parameters, matching the
/// KVP form, since this service's clients submit version=2.0.0 the same way
/// as version=1.0.0 (only the response rendering differs by `Accept`).
pub async fn execute_xml(
    State(state): State<AppState>,
    Query(query): Query<WpsKvpQuery>,
    headers: HeaderMap,
    _body: axum::body::Bytes,
) -> Result<Response, ApiError> {
    execute_kvp(State(state), Query(query), headers).await
}
