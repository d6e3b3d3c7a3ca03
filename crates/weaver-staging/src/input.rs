use std::path::{Path, PathBuf};

use weaver_contracts::io::{IoEntry, IoValue};

use crate::config::OPENSEARCH_LOCAL_FILE_SCHEME;
use crate::error::StagingError;
use crate::fetch::fetch_to_file;

/// A realized, locally-usable input, ready to hand to a container runner or
/// remote-adapter request builder.
#[derive(Debug, Clone, PartialEq)]
pub enum StagedValue {
    LocalPath(PathBuf),
    Literal(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StagedInput {
    pub id: String,
    pub value: StagedValue,
}

/// Stages every input entry into `workdir`. HTTP(S) hrefs are fetched,
/// `file://` hrefs under `wps_output_dir` are linked (never re-fetched), the
/// opensearch local-file scheme is rewritten to `file://` first and then
/// handled identically, and literal values pass through untouched.
pub async fn stage_inputs(
    client: &reqwest::Client,
    inputs: &[IoEntry],
    workdir: &Path,
) -> Result<Vec<StagedInput>, StagingError> {
    let mut staged = Vec::with_capacity(inputs.len());
    for entry in inputs {
        let value = match &entry.value {
            IoValue::Value { value } => StagedValue::Literal(value.clone()),
            IoValue::Href { href, .. } => {
                let rewritten = rewrite_opensearch_scheme(href);
                let dest_dir = workdir.join("inputs").join(&entry.id);
                StagedValue::LocalPath(stage_href(client, &rewritten, &dest_dir).await?)
            }
        };
        staged.push(StagedInput { id: entry.id.clone(), value });
    }
    Ok(staged)
}

/// Rewrites an opensearch local-file reference to a plain `file://` URL; any
/// other scheme passes through unchanged. This happens once, in staging,
/// rather than in the HTTP layer, so the `file://` branch below handles both.
fn rewrite_opensearch_scheme(href: &str) -> String {
    let prefix = format!("{OPENSEARCH_LOCAL_FILE_SCHEME}://");
    match href.strip_prefix(&prefix) {
        Some(rest) => format!("file://{rest}"),
        None => href.to_string(),
    }
}

async fn stage_href(client: &reqwest::Client, href: &str, dest_dir: &Path) -> Result<PathBuf, StagingError> {
    if let Some(http_url) = href.strip_prefix("http://").map(|_| href).or(href.strip_prefix("https://").map(|_| href)) {
        let basename = basename_of(http_url);
        let dest = dest_dir.join(basename);
        fetch_to_file(client, http_url, &dest).await?;
        return Ok(dest);
    }

    if let Some(path) = href.strip_prefix("file://") {
        let source = PathBuf::from(path);
        let basename = basename_of(path);
        let dest = dest_dir.join(basename);
        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| StagingError::Io { path: dest_dir.display().to_string(), detail: e.to_string() })?;
        link_or_copy(&source, &dest).await?;
        return Ok(dest);
    }

    Err(StagingError::UnsupportedScheme(href.to_string()))
}

/// Prefers a hard link, falls back to a symlink, falls back to a copy — the
/// cheapest operation that will actually succeed across the source and
/// destination filesystems.
async fn link_or_copy(source: &Path, dest: &Path) -> Result<(), StagingError> {
    let source = source.to_path_buf();
    let dest_owned = dest.to_path_buf();
    let result = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        if std::fs::hard_link(&source, &dest_owned).is_ok() {
            return Ok(());
        }
        #[cfg(unix)]
        {
            if std::os::unix::fs::symlink(&source, &dest_owned).is_ok() {
                return Ok(());
            }
        }
        std::fs::copy(&source, &dest_owned).map(|_| ())
    })
    .await
    .map_err(|e| StagingError::Io { path: dest.display().to_string(), detail: e.to_string() })?;

    result.map_err(|e| StagingError::Io { path: dest.display().to_string(), detail: e.to_string() })
}

fn basename_of(path_or_url: &str) -> String {
    path_or_url.rsplit('/').next().filter(|s| !s.is_empty()).unwrap_or("input").to_string()
}
