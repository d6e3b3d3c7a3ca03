use std::path::Path;

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::error::StagingError;

const MAX_ATTEMPTS: u32 = 3;

/// Fetches `url` into `dest`, retrying transient failures and resuming via
/// HTTP range requests when the server advertises `Accept-Ranges: bytes` and
/// a partial file is already present from a prior attempt.
pub async fn fetch_to_file(client: &reqwest::Client, url: &str, dest: &Path) -> Result<(), StagingError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match fetch_once(client, url, dest).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < MAX_ATTEMPTS => {
                tracing::warn!(url, attempt, error = %e, "transient fetch failure, retrying");
            }
            Err(e) => return Err(e),
        }
    }
}

async fn fetch_once(client: &reqwest::Client, url: &str, dest: &Path) -> Result<(), StagingError> {
    let existing = tokio::fs::metadata(dest).await.map(|m| m.len()).unwrap_or(0);

    let mut request = client.get(url);
    if existing > 0 {
        request = request.header("Range", format!("bytes={existing}-"));
    }

    let response = request.send().await.map_err(|e| StagingError::Fetch { url: url.to_string(), detail: e.to_string() })?;

    let status = response.status();
    let resumed = status.as_u16() == 206;
    if !status.is_success() {
        return Err(StagingError::Fetch { url: url.to_string(), detail: format!("unexpected status {status}") });
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StagingError::Io { path: parent.display().to_string(), detail: e.to_string() })?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(resumed)
        .truncate(!resumed)
        .open(dest)
        .await
        .map_err(|e| StagingError::Io { path: dest.display().to_string(), detail: e.to_string() })?;

    let bytes = response
        .bytes()
        .await
        .map_err(|e| StagingError::Fetch { url: url.to_string(), detail: e.to_string() })?;
    file.write_all(&bytes).await.map_err(|e| StagingError::Io { path: dest.display().to_string(), detail: e.to_string() })?;
    file.flush().await.map_err(|e| StagingError::Io { path: dest.display().to_string(), detail: e.to_string() })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetches_full_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/file.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello world"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("file.txt");
        let client = reqwest::Client::new();
        fetch_to_file(&client, &format!("{}/file.txt", server.uri()), &dest).await.unwrap();

        let content = tokio::fs::read_to_string(&dest).await.unwrap();
        assert_eq!(content, "hello world");
    }

    #[tokio::test]
    async fn surfaces_an_error_on_persistent_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing.txt");
        let client = reqwest::Client::new();
        let err = fetch_to_file(&client, &format!("{}/missing.txt", server.uri()), &dest).await.unwrap_err();
        assert!(matches!(err, StagingError::Fetch { .. }));
    }
}
