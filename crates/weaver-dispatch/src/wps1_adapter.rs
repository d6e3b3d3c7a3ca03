use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use weaver_contracts::io::{IoEntry, IoValue};

use crate::error::AdapterError;
use crate::progress::wps1_poll_delay_secs;
use crate::remote_process::{DispatchHandle, ProgressSink, RemoteProcess};

const MAX_CONSECUTIVE_SOFT_FAILURES: u32 = 5;

/// One input as it is rendered into a WPS-1 `DataInputs` entry: complex
/// inputs are always passed by reference (`href`), matching the adapter
/// contract ("complex inputs passed by reference").
#[derive(Debug, Clone)]
struct Wps1DataInput {
    id: String,
    href: Option<String>,
    value: Option<String>,
    mime_type: Option<String>,
}

fn to_wps1_inputs(inputs: &[IoEntry]) -> Vec<Wps1DataInput> {
    inputs
        .iter()
        .map(|entry| match &entry.value {
            IoValue::Href { href, mime_type } => {
                Wps1DataInput { id: entry.id.clone(), href: Some(href.clone()), value: None, mime_type: mime_type.clone() }
            }
            IoValue::Value { value } => {
                let rendered = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Wps1DataInput { id: entry.id.clone(), href: None, value: Some(rendered), mime_type: None }
            }
        })
        .collect()
}

fn kvp_data_inputs(inputs: &[Wps1DataInput]) -> String {
    inputs
        .iter()
        .map(|i| match (&i.href, &i.value, &i.mime_type) {
            (Some(href), _, Some(mime)) => format!("{}={}@mimeType={}", i.id, href, mime),
            (Some(href), _, None) => format!("{}={}", i.id, href),
            (None, Some(value), _) => format!("{}={}", i.id, value),
            _ => format!("{}=", i.id),
        })
        .collect::<Vec<_>>()
        .join(";")
}

fn execute_request_body_xml(identifier: &str, inputs: &[Wps1DataInput]) -> String {
    let data_inputs: String = inputs
        .iter()
        .map(|i| match (&i.href, &i.value) {
            (Some(href), _) => format!("<wps:Input><ows:Identifier>{}</ows:Identifier><wps:Reference xlink:href=\"{href}\"/></wps:Input>", i.id),
            (None, Some(value)) => format!("<wps:Input><ows:Identifier>{}</ows:Identifier><wps:Data><wps:LiteralData>{value}</wps:LiteralData></wps:Data></wps:Input>", i.id),
            _ => String::new(),
        })
        .collect();
    format!(
        "<wps:Execute xmlns:wps=\"http://www.opengis.net/wps/2.0\" xmlns:ows=\"http://www.opengis.net/ows/2.0\" xmlns:xlink=\"http://www.w3.org/1999/xlink\" service=\"WPS\" version=\"2.0.0\">\
<ows:Identifier>{identifier}</ows:Identifier><wps:DataInputs>{data_inputs}</wps:DataInputs></wps:Execute>"
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename = "ExecuteResponse")]
struct ExecuteResponseXml {
    #[serde(rename = "@statusLocation")]
    status_location: Option<String>,
    #[serde(rename = "Status", default)]
    status: Option<StatusXml>,
    #[serde(rename = "ProcessOutputs", default)]
    process_outputs: Option<ProcessOutputsXml>,
}

#[derive(Debug, Deserialize)]
struct StatusXml {
    #[serde(rename = "ProcessAccepted", default)]
    process_accepted: Option<String>,
    #[serde(rename = "ProcessStarted", default)]
    process_started: Option<ProcessStartedXml>,
    #[serde(rename = "ProcessPaused", default)]
    process_paused: Option<ProcessStartedXml>,
    #[serde(rename = "ProcessSucceeded", default)]
    process_succeeded: Option<String>,
    #[serde(rename = "ProcessFailed", default)]
    process_failed: Option<ExceptionReportXml>,
}

#[derive(Debug, Deserialize)]
struct ProcessStartedXml {
    #[serde(rename = "@percentCompleted", default)]
    percent_completed: Option<u8>,
    #[serde(rename = "$text", default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExceptionReportXml {
    #[serde(rename = "Exception", default)]
    exception: Option<ExceptionXml>,
}

#[derive(Debug, Deserialize)]
struct ExceptionXml {
    #[serde(rename = "ExceptionText", default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProcessOutputsXml {
    #[serde(rename = "Output", default)]
    outputs: Vec<OutputXml>,
}

#[derive(Debug, Deserialize)]
struct OutputXml {
    #[serde(rename = "Identifier")]
    identifier: String,
    #[serde(rename = "Reference", default)]
    reference: Option<ReferenceXml>,
    #[serde(rename = "Data", default)]
    data: Option<DataXml>,
}

#[derive(Debug, Deserialize)]
struct ReferenceXml {
    #[serde(rename = "@href")]
    href: String,
}

#[derive(Debug, Deserialize)]
struct DataXml {
    #[serde(rename = "$text", default)]
    value: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum Wps1Status {
    Accepted,
    Started { percent_completed: u8 },
    Paused { percent_completed: u8 },
    Succeeded,
    Failed { message: String },
}

fn parse_status(xml: &str) -> Result<(Wps1Status, Option<ProcessOutputsXml>), AdapterError> {
    let response: ExecuteResponseXml = quick_xml::de::from_str(xml)
        .map_err(|e| AdapterError::Malformed { service: "wps1".to_string(), what: "ExecuteResponse".to_string(), detail: e.to_string() })?;
    let status = response
        .status
        .ok_or_else(|| AdapterError::Malformed { service: "wps1".to_string(), what: "ExecuteResponse".to_string(), detail: "missing Status element".to_string() })?;

    let resolved = if status.process_succeeded.is_some() {
        Wps1Status::Succeeded
    } else if let Some(failed) = status.process_failed {
        let message = failed.exception.and_then(|e| e.text).unwrap_or_else(|| "process failed".to_string());
        Wps1Status::Failed { message }
    } else if let Some(started) = status.process_started {
        Wps1Status::Started { percent_completed: started.percent_completed.unwrap_or(0) }
    } else if let Some(paused) = status.process_paused {
        Wps1Status::Paused { percent_completed: paused.percent_completed.unwrap_or(0) }
    } else if status.process_accepted.is_some() {
        Wps1Status::Accepted
    } else {
        return Err(AdapterError::Malformed { service: "wps1".to_string(), what: "ExecuteResponse".to_string(), detail: "no recognized status variant".to_string() });
    };

    Ok((resolved, response.process_outputs))
}

/// Extracts each `ProcessOutputs/Output` as a result `IoEntry`. When an
/// output carries both a `Reference` and a `Data` element, the reference
/// wins and the inline data is ignored.
fn extract_results(outputs: ProcessOutputsXml) -> Vec<IoEntry> {
    outputs
        .outputs
        .into_iter()
        .map(|o| {
            let value = match (o.reference, o.data) {
                (Some(reference), _) => IoValue::Href { href: reference.href, mime_type: None },
                (None, Some(data)) => IoValue::Value { value: serde_json::Value::String(data.value.unwrap_or_default()) },
                (None, None) => IoValue::Value { value: serde_json::Value::Null },
            };
            IoEntry { id: o.identifier, value }
        })
        .collect()
}

struct Wps1Handle {
    status_location: String,
}

/// Dispatches and polls a process exposed over WPS 1.0/2.0.
pub struct WPS1Adapter {
    client: reqwest::Client,
    endpoint: String,
    identifier: String,
    use_kvp: bool,
}

impl WPS1Adapter {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, identifier: impl Into<String>, use_kvp: bool) -> Self {
        Self { client, endpoint: endpoint.into(), identifier: identifier.into(), use_kvp }
    }

    async fn fetch_status(&self, status_location: &str) -> Result<(Wps1Status, Option<ProcessOutputsXml>), AdapterError> {
        let body = self
            .client
            .get(status_location)
            .send()
            .await
            .map_err(|e| AdapterError::Transport { service: self.endpoint.clone(), detail: e.to_string() })?
            .text()
            .await
            .map_err(|e| AdapterError::Transport { service: self.endpoint.clone(), detail: e.to_string() })?;
        parse_status(&body)
    }
}

#[async_trait]
impl RemoteProcess for WPS1Adapter {
    async fn dispatch(&self, inputs: &[IoEntry], _outputs: &[IoEntry]) -> Result<DispatchHandle, AdapterError> {
        let wps_inputs = to_wps1_inputs(inputs);

        let response_body = if self.use_kvp {
            let data_inputs = kvp_data_inputs(&wps_inputs);
            let url = format!(
                "{}?service=WPS&request=Execute&version=1.0.0&identifier={}&DataInputs={}",
                self.endpoint, self.identifier, data_inputs
            );
            self.client.get(&url).send().await
        } else {
            let body = execute_request_body_xml(&self.identifier, &wps_inputs);
            self.client.post(&self.endpoint).header("Content-Type", "application/xml").body(body).send().await
        }
        .map_err(|e| AdapterError::Transport { service: self.endpoint.clone(), detail: e.to_string() })?;

        let text = response_body
            .text()
            .await
            .map_err(|e| AdapterError::Transport { service: self.endpoint.clone(), detail: e.to_string() })?;
        let response: ExecuteResponseXml = quick_xml::de::from_str(&text)
            .map_err(|e| AdapterError::Malformed { service: self.endpoint.clone(), what: "ExecuteResponse".to_string(), detail: e.to_string() })?;
        let status_location = response
            .status_location
            .ok_or_else(|| AdapterError::Malformed { service: self.endpoint.clone(), what: "ExecuteResponse".to_string(), detail: "missing statusLocation".to_string() })?;

        Ok(DispatchHandle(Box::new(Wps1Handle { status_location })))
    }

    async fn monitor(&self, handle: &DispatchHandle, sink: &dyn ProgressSink, cancel: &CancellationToken) -> Result<bool, AdapterError> {
        let handle = handle.0.downcast_ref::<Wps1Handle>().expect("wps1 adapter handle carries a Wps1Handle");
        let mut attempt = 0usize;
        let mut consecutive_failures = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(AdapterError::Cancelled);
            }

            match self.fetch_status(&handle.status_location).await {
                Ok((status, _)) => {
                    consecutive_failures = 0;
                    match status {
                        Wps1Status::Succeeded => return Ok(true),
                        Wps1Status::Failed { .. } => return Ok(false),
                        Wps1Status::Started { percent_completed } | Wps1Status::Paused { percent_completed } => {
                            sink.report(percent_completed, "monitor").await;
                        }
                        Wps1Status::Accepted => {}
                    }
                }
                Err(_) => {
                    consecutive_failures += 1;
                    if consecutive_failures >= MAX_CONSECUTIVE_SOFT_FAILURES {
                        return Err(AdapterError::PollingExhausted { service: self.endpoint.clone(), attempts: consecutive_failures });
                    }
                }
            }

            let delay = Duration::from_secs(wps1_poll_delay_secs(attempt));
            attempt += 1;
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => return Err(AdapterError::Cancelled),
            }
        }
    }

    async fn get_results(&self, handle: &DispatchHandle) -> Result<Vec<IoEntry>, AdapterError> {
        let handle = handle.0.downcast_ref::<Wps1Handle>().expect("wps1 adapter handle carries a Wps1Handle");
        let (_, outputs) = self.fetch_status(&handle.status_location).await?;
        Ok(outputs.map(extract_results).unwrap_or_default())
    }

    async fn stage_results(&self, results: &[IoEntry], _expected: &[IoEntry], _out_dir: &Path) -> Result<Vec<IoEntry>, AdapterError> {
        Ok(results.to_vec())
    }
}
