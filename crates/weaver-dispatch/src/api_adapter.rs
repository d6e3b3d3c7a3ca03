use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use weaver_contracts::io::IoEntry;

use crate::error::AdapterError;
use crate::remote_process::{DispatchHandle, ProgressSink, RemoteProcess};

const POLL_INTERVAL: Duration = Duration::from_secs(3);
const UNRELIABLE_RETRY_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct ExecutionRequest<'a> {
    mode: &'a str,
    response: &'a str,
    inputs: &'a [IoEntry],
}

#[derive(Debug, Deserialize)]
struct StatusDocument {
    status: String,
    #[serde(default)]
    progress: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct ResultsDocument {
    #[serde(default)]
    outputs: Vec<IoEntry>,
}

struct ApiHandle {
    location: String,
}

/// A test-injection hook overriding the terminal status an otherwise-healthy
/// poll loop would report. No other code path may simulate a status; this
/// field exists solely so integration tests can force a terminal transition
/// without standing up a full remote state machine.
pub type StatusCodeMock = Option<String>;

/// Dispatches to a remote OGC API — Processes endpoint and polls its job
/// status until terminal.
pub struct APIProcessesAdapter {
    client: reqwest::Client,
    base_url: String,
    process_id: String,
    status_code_mock: StatusCodeMock,
    /// The last `Location` a `dispatch` call received, stashed so `dismiss`
    /// has somewhere to send its best-effort `DELETE` without threading the
    /// opaque `DispatchHandle` back through the engine.
    dispatched_location: tokio::sync::Mutex<Option<String>>,
}

impl APIProcessesAdapter {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, process_id: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            process_id: process_id.into(),
            status_code_mock: None,
            dispatched_location: tokio::sync::Mutex::new(None),
        }
    }

    /// For test injection only: forces the next terminal status reported by
    /// `monitor` regardless of the remote's actual response body.
    pub fn with_status_code_mock(mut self, status: impl Into<String>) -> Self {
        self.status_code_mock = Some(status.into());
        self
    }

    /// Issues a GET, retrying exactly once after a 10-second pause on an
    /// HTTP 502 — the "unreliable upstream" allowance in the adapter design.
    async fn get_with_retry(&self, url: &str, cancel: &CancellationToken) -> Result<reqwest::Response, AdapterError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AdapterError::Transport { service: self.base_url.clone(), detail: e.to_string() })?;

        if response.status().as_u16() == 502 {
            tokio::select! {
                _ = tokio::time::sleep(UNRELIABLE_RETRY_DELAY) => {}
                _ = cancel.cancelled() => return Err(AdapterError::Cancelled),
            }
            return self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| AdapterError::Transport { service: self.base_url.clone(), detail: e.to_string() });
        }

        Ok(response)
    }
}

#[async_trait]
impl RemoteProcess for APIProcessesAdapter {
    async fn dispatch(&self, inputs: &[IoEntry], _outputs: &[IoEntry]) -> Result<DispatchHandle, AdapterError> {
        let url = format!("{}/processes/{}/execution", self.base_url.trim_end_matches('/'), self.process_id);
        let request = ExecutionRequest { mode: "async", response: "document", inputs };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AdapterError::Transport { service: self.base_url.clone(), detail: e.to_string() })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(AdapterError::UnexpectedStatus { service: self.base_url.clone(), status, detail: "execution request rejected".to_string() });
        }

        let location = response
            .headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| AdapterError::Malformed { service: self.base_url.clone(), what: "execution response".to_string(), detail: "missing Location header".to_string() })?;

        *self.dispatched_location.lock().await = Some(location.clone());
        Ok(DispatchHandle(Box::new(ApiHandle { location })))
    }

    async fn monitor(&self, handle: &DispatchHandle, sink: &dyn ProgressSink, cancel: &CancellationToken) -> Result<bool, AdapterError> {
        let handle = handle.0.downcast_ref::<ApiHandle>().expect("api adapter handle carries an ApiHandle");

        loop {
            if cancel.is_cancelled() {
                return Err(AdapterError::Cancelled);
            }

            let response = self.get_with_retry(&handle.location, cancel).await?;
            let status: StatusDocument = response
                .json()
                .await
                .map_err(|e| AdapterError::Malformed { service: self.base_url.clone(), what: "status document".to_string(), detail: e.to_string() })?;

            let reported_status = self.status_code_mock.clone().unwrap_or(status.status);
            if let Some(progress) = status.progress {
                sink.report(progress, "monitor").await;
            }

            match reported_status.as_str() {
                "successful" | "succeeded" => return Ok(true),
                "failed" => return Ok(false),
                "dismissed" => return Ok(false),
                _ => {}
            }

            tokio::select! {
                _ = tokio::time::sleep(POLL_INTERVAL) => {}
                _ = cancel.cancelled() => return Err(AdapterError::Cancelled),
            }
        }
    }

    async fn get_results(&self, handle: &DispatchHandle) -> Result<Vec<IoEntry>, AdapterError> {
        let handle = handle.0.downcast_ref::<ApiHandle>().expect("api adapter handle carries an ApiHandle");
        let url = format!("{}/results", handle.location.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AdapterError::Transport { service: self.base_url.clone(), detail: e.to_string() })?;
        let results: ResultsDocument = response
            .json()
            .await
            .map_err(|e| AdapterError::Malformed { service: self.base_url.clone(), what: "results document".to_string(), detail: e.to_string() })?;
        Ok(results.outputs)
    }

    async fn stage_results(&self, results: &[IoEntry], _expected: &[IoEntry], _out_dir: &Path) -> Result<Vec<IoEntry>, AdapterError> {
        Ok(results.to_vec())
    }

    /// Issues a best-effort `DELETE` against the job's `Location`, swallowing
    /// any error — the engine has already decided to dismiss the job
    /// regardless of whether the remote honors the request.
    async fn dismiss(&self) -> Result<(), AdapterError> {
        let Some(location) = self.dispatched_location.lock().await.clone() else {
            return Ok(());
        };
        let _ = self.client.delete(&location).send().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weaver_contracts::io::IoValue;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn dispatch_reads_location_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/processes/echo/execution"))
            .respond_with(ResponseTemplate::new(201).insert_header("Location", format!("{}/jobs/abc", server.uri())))
            .mount(&server)
            .await;

        let adapter = APIProcessesAdapter::new(reqwest::Client::new(), server.uri(), "echo");
        let handle = adapter.dispatch(&[], &[]).await.unwrap();
        let handle = handle.0.downcast_ref::<ApiHandle>().unwrap();
        assert_eq!(handle.location, format!("{}/jobs/abc", server.uri()));
    }

    #[tokio::test]
    async fn dismiss_sends_delete_to_the_dispatched_location() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/processes/echo/execution"))
            .respond_with(ResponseTemplate::new(201).insert_header("Location", format!("{}/jobs/abc", server.uri())))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/jobs/abc"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = APIProcessesAdapter::new(reqwest::Client::new(), server.uri(), "echo");
        adapter.dispatch(&[], &[]).await.unwrap();
        adapter.dismiss().await.unwrap();
    }

    #[tokio::test]
    async fn dismiss_before_any_dispatch_is_a_noop() {
        let adapter = APIProcessesAdapter::new(reqwest::Client::new(), "http://unused.invalid", "echo");
        adapter.dismiss().await.unwrap();
    }

    #[tokio::test]
    async fn monitor_retries_once_after_a_502_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs/abc"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/jobs/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "successful", "progress": 100})))
            .mount(&server)
            .await;

        let adapter = APIProcessesAdapter::new(reqwest::Client::new(), server.uri(), "echo");
        let handle = DispatchHandle(Box::new(ApiHandle { location: format!("{}/jobs/abc", server.uri()) }));
        let sink = crate::remote_process::NullProgressSink;
        let cancel = CancellationToken::new();
        tokio::time::pause();
        let success = adapter.monitor(&handle, &sink, &cancel).await.unwrap();
        assert!(success);
    }

    #[tokio::test]
    async fn status_code_mock_overrides_the_real_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "running", "progress": 50})))
            .mount(&server)
            .await;

        let adapter = APIProcessesAdapter::new(reqwest::Client::new(), server.uri(), "echo").with_status_code_mock("failed");
        let handle = DispatchHandle(Box::new(ApiHandle { location: format!("{}/jobs/abc", server.uri()) }));
        let sink = crate::remote_process::NullProgressSink;
        let cancel = CancellationToken::new();
        let success = adapter.monitor(&handle, &sink, &cancel).await.unwrap();
        assert!(!success);
    }

    #[tokio::test]
    async fn get_results_parses_outputs_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs/abc/results"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "outputs": [{"id": "out", "href": "http://x/out.nc"}]
            })))
            .mount(&server)
            .await;

        let adapter = APIProcessesAdapter::new(reqwest::Client::new(), server.uri(), "echo");
        let handle = DispatchHandle(Box::new(ApiHandle { location: format!("{}/jobs/abc", server.uri()) }));
        let results = adapter.get_results(&handle).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].value, IoValue::Href { href: "http://x/out.nc".to_string(), mime_type: None });
    }
}
