use std::sync::Arc;

use crate::cache::PackageCache;
use crate::model::{parse_package, PackageDescription, PackageError};
use crate::plan::PackageFetcher;

/// The `PackageFetcher` used outside tests: fetches a package description
/// over HTTP(S), behind the single-flight, TTL'd `PackageCache`.
///
/// Remote fetches in the package loader always target an API endpoint
/// (`<url>/package`), not a file path, so no extension is passed to
/// `parse_package` — the body is parsed as YAML (which accepts JSON)
/// regardless of what the URL happens to end with.
pub struct HttpPackageFetcher {
    client: reqwest::Client,
    cache: Arc<PackageCache>,
    /// Base URL of the locally registered processes API (e.g.
    /// `<wps_url>/processes`), used to resolve a workflow step's local
    /// `<name>.cwl` reference once it has been converted to a process id.
    local_base: String,
}

impl HttpPackageFetcher {
    pub fn new(client: reqwest::Client, cache: Arc<PackageCache>, local_base: impl Into<String>) -> Self {
        Self { client, cache, local_base: local_base.into() }
    }
}

#[async_trait::async_trait]
impl PackageFetcher for HttpPackageFetcher {
    async fn fetch(&self, url: &str) -> Result<PackageDescription, PackageError> {
        let client = self.client.clone();
        let url_owned = url.to_string();
        self.cache
            .get_or_fetch(url, move || async move {
                let response = client
                    .get(&url_owned)
                    .send()
                    .await
                    .map_err(|e| PackageError::Fetch { url: url_owned.clone(), detail: e.to_string() })?;
                let body = response
                    .text()
                    .await
                    .map_err(|e| PackageError::Fetch { url: url_owned.clone(), detail: e.to_string() })?;
                parse_package(None, &body)
            })
            .await
    }

    /// A local step reference is converted to a process id (per the
    /// original loader) and fetched from the locally registered processes
    /// API, exactly like any other `<url>/package` fetch.
    async fn fetch_local(&self, name: &str) -> Result<PackageDescription, PackageError> {
        let url = format!("{}/{}/package", self.local_base.trim_end_matches('/'), name);
        self.fetch(&url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetch_parses_the_remote_body_as_a_package() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/processes/p1/package"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"class":"CommandLineTool"}"#))
            .mount(&server)
            .await;

        let fetcher = HttpPackageFetcher::new(
            reqwest::Client::new(),
            Arc::new(PackageCache::new(std::time::Duration::from_secs(60))),
            format!("{}/processes", server.uri()),
        );
        let pkg = fetcher.fetch(&format!("{}/processes/p1/package", server.uri())).await.unwrap();
        assert_eq!(pkg.class, "CommandLineTool");
    }

    #[tokio::test]
    async fn fetch_local_resolves_a_step_name_against_the_local_processes_api() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/processes/p1/package"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"class":"CommandLineTool","docker_pull":"debian:stretch-slim"}"#))
            .mount(&server)
            .await;

        let fetcher = HttpPackageFetcher::new(
            reqwest::Client::new(),
            Arc::new(PackageCache::new(std::time::Duration::from_secs(60))),
            format!("{}/processes", server.uri()),
        );
        let pkg = fetcher.fetch_local("p1").await.unwrap();
        assert_eq!(pkg.docker_pull.as_deref(), Some("debian:stretch-slim"));
    }
}
