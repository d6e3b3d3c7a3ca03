use std::path::{Path, PathBuf};

use weaver_contracts::io::{IoEntry, IoValue};

use crate::config::StagingConfig;
use crate::error::StagingError;

/// A file a completed step produced locally, not yet published.
#[derive(Debug, Clone)]
pub struct ProducedOutput {
    pub id: String,
    pub local_path: PathBuf,
}

/// Copies each produced output into
/// `<output_dir>/[<context>/]<job_id>/<output_id>/<filename>` and returns an
/// `href`-carrying `IoEntry` pointing at the matching public URL.
pub async fn stage_outputs(
    produced: &[ProducedOutput],
    config: &StagingConfig,
    context: Option<&str>,
    job_id: &str,
) -> Result<Vec<IoEntry>, StagingError> {
    let job_dir = config.job_output_dir(context, job_id);
    let job_url = config.job_output_url(context, job_id);

    let mut entries = Vec::with_capacity(produced.len());
    for output in produced {
        let filename = output
            .local_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("output")
            .to_string();
        let dest_dir = job_dir.join(&output.id);
        let dest = dest_dir.join(&filename);

        tokio::fs::create_dir_all(&dest_dir)
            .await
            .map_err(|e| StagingError::Io { path: dest_dir.display().to_string(), detail: e.to_string() })?;
        tokio::fs::copy(&output.local_path, &dest)
            .await
            .map_err(|e| StagingError::Io { path: dest.display().to_string(), detail: e.to_string() })?;

        let href = format!("{job_url}/{}/{filename}", output.id);
        entries.push(IoEntry { id: output.id.clone(), value: IoValue::Href { href, mime_type: None } });
    }

    if let Some(bucket) = &config.output_s3_bucket {
        mirror_to_s3(bucket, &entries).await;
    }

    Ok(entries)
}

/// Named hook for `wps.output_s3_bucket`: "if set, also copy outputs to
/// S3". No S3 SDK is wired in — this crate has no object-storage
/// collaborator the way it has a `ContainerRunner` for containers, so the
/// hook is a logged no-op, matching the out-of-scope collaborators
/// (billing/quoting, notification dispatch) named alongside it.
async fn mirror_to_s3(bucket: &str, entries: &[IoEntry]) {
    for entry in entries {
        if let Some(href) = entry.value.href() {
            tracing::info!(bucket, output_id = %entry.id, href, "would mirror output to S3 (no-op)");
        }
    }
}

/// Publishes a local path already under the output directory as a public URL
/// without copying it anywhere — the "bypass download" path used when an
/// output reference already resolves to a file this process controls.
///
/// Returns `None` when `path` falls outside `config.output_dir`, matching the
/// `host_file` hard-error rule in the staging design.
pub fn host_file(config: &StagingConfig, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(&config.output_dir).ok()?;
    Some(format!("{}/{}", config.output_url.trim_end_matches('/'), relative.display()))
}

/// Bidirectional mapping between a public output URL and its local path.
///
/// Forward (`url_to_path`): returns the local path only when `url` is under
/// `config.output_url` *and* (unless `exists=false`) the file is present.
/// Reverse (`path_to_url`): returns the public URL only when `path` is under
/// `config.output_dir`.
pub fn url_to_path(config: &StagingConfig, url: &str, check_exists: bool) -> Option<PathBuf> {
    let prefix = config.output_url.trim_end_matches('/');
    let relative = url.strip_prefix(prefix)?.trim_start_matches('/');
    let path = config.output_dir.join(relative);
    if check_exists && !path.exists() {
        return None;
    }
    Some(path)
}

pub fn path_to_url(config: &StagingConfig, path: &Path) -> Option<String> {
    host_file(config, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dir: &Path) -> StagingConfig {
        StagingConfig {
            output_dir: dir.to_path_buf(),
            output_url: "http://localhost:8000/wpsoutputs".to_string(),
            workdir: dir.to_path_buf(),
            default_output_context: None,
            output_s3_bucket: None,
        }
    }

    #[tokio::test]
    async fn stage_outputs_copies_files_and_builds_hrefs() {
        let dir = tempfile::tempdir().unwrap();
        let source_dir = dir.path().join("work");
        tokio::fs::create_dir_all(&source_dir).await.unwrap();
        let source = source_dir.join("stdout.log");
        tokio::fs::write(&source, "Hello").await.unwrap();

        let cfg = config(dir.path());
        let produced = vec![ProducedOutput { id: "output".to_string(), local_path: source }];
        let entries = stage_outputs(&produced, &cfg, None, "job-1").await.unwrap();

        assert_eq!(entries.len(), 1);
        let href = entries[0].value.href().unwrap();
        assert_eq!(href, "http://localhost:8000/wpsoutputs/job-1/output/stdout.log");

        let copied = dir.path().join("job-1").join("output").join("stdout.log");
        let content = tokio::fs::read_to_string(copied).await.unwrap();
        assert_eq!(content, "Hello");
    }

    #[test]
    fn url_to_path_round_trips_when_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let nested = dir.path().join("job-1").join("out").join("f.txt");
        std::fs::create_dir_all(nested.parent().unwrap()).unwrap();
        std::fs::write(&nested, "x").unwrap();

        let url = path_to_url(&cfg, &nested).unwrap();
        let back = url_to_path(&cfg, &url, true).unwrap();
        assert_eq!(back, nested);
    }

    #[test]
    fn url_to_path_rejects_urls_outside_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        assert!(url_to_path(&cfg, "http://elsewhere/file.txt", false).is_none());
    }

    #[tokio::test]
    async fn stage_outputs_mirrors_to_s3_when_bucket_configured() {
        let dir = tempfile::tempdir().unwrap();
        let source_dir = dir.path().join("work");
        tokio::fs::create_dir_all(&source_dir).await.unwrap();
        let source = source_dir.join("stdout.log");
        tokio::fs::write(&source, "Hello").await.unwrap();

        let mut cfg = config(dir.path());
        cfg.output_s3_bucket = Some("my-bucket".to_string());
        let produced = vec![ProducedOutput { id: "output".to_string(), local_path: source }];

        // The hook is a logged no-op; this only asserts it doesn't disturb
        // the normal staging result when a bucket is configured.
        let entries = stage_outputs(&produced, &cfg, None, "job-1").await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn url_to_path_rejects_missing_file_unless_exists_check_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let url = format!("{}/job-1/out/missing.txt", cfg.output_url);
        assert!(url_to_path(&cfg, &url, true).is_none());
        assert!(url_to_path(&cfg, &url, false).is_some());
    }
}
