use std::path::PathBuf;

/// The internal scheme used to pass already-local files between EMS and
/// ADES without triggering a re-download, per the glossary's "opensearch
/// local-file scheme" entry.
pub const OPENSEARCH_LOCAL_FILE_SCHEME: &str = "opensearch";

/// Staging configuration, backed by the `wps.*` environment variables named
/// in the external interfaces table.
#[derive(Debug, Clone)]
pub struct StagingConfig {
    pub output_dir: PathBuf,
    pub output_url: String,
    pub workdir: PathBuf,
    pub default_output_context: Option<String>,
    /// `wps.output_s3_bucket`: when set, outputs are also copied to this S3
    /// bucket after local publication, via `S3OutputMirror`.
    pub output_s3_bucket: Option<String>,
}

impl StagingConfig {
    pub fn from_env() -> Self {
        Self {
            output_dir: std::env::var("WPS_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp/weaver/outputs")),
            output_url: std::env::var("WPS_OUTPUT_URL")
                .unwrap_or_else(|_| "http://localhost:8000/wpsoutputs".to_string()),
            workdir: std::env::var("WPS_WORKDIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp/weaver/workdir")),
            default_output_context: std::env::var("WPS_OUTPUT_CONTEXT").ok(),
            output_s3_bucket: std::env::var("WPS_OUTPUT_S3_BUCKET").ok(),
        }
    }

    /// The effective output directory for a job, threading in the
    /// sub-context directory tree (request header takes precedence over the
    /// configured default).
    pub fn job_output_dir(&self, context: Option<&str>, job_id: &str) -> PathBuf {
        let context = context.or(self.default_output_context.as_deref());
        match context {
            Some(ctx) => self.output_dir.join(ctx).join(job_id),
            None => self.output_dir.join(job_id),
        }
    }

    pub fn job_output_url(&self, context: Option<&str>, job_id: &str) -> String {
        let context = context.or(self.default_output_context.as_deref());
        match context {
            Some(ctx) => format!("{}/{}/{}", self.output_url.trim_end_matches('/'), ctx, job_id),
            None => format!("{}/{}", self.output_url.trim_end_matches('/'), job_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> StagingConfig {
        StagingConfig {
            output_dir: PathBuf::from("/data/outputs"),
            output_url: "http://host/wpsoutputs/".to_string(),
            workdir: PathBuf::from("/data/work"),
            default_output_context: None,
            output_s3_bucket: None,
        }
    }

    #[test]
    fn job_output_dir_without_context() {
        let cfg = config();
        assert_eq!(cfg.job_output_dir(None, "job-1"), PathBuf::from("/data/outputs/job-1"));
    }

    #[test]
    fn job_output_dir_header_context_wins_over_default() {
        let mut cfg = config();
        cfg.default_output_context = Some("default-ctx".to_string());
        assert_eq!(
            cfg.job_output_dir(Some("req-ctx"), "job-1"),
            PathBuf::from("/data/outputs/req-ctx/job-1")
        );
    }

    #[test]
    fn job_output_dir_falls_back_to_default_context() {
        let mut cfg = config();
        cfg.default_output_context = Some("default-ctx".to_string());
        assert_eq!(
            cfg.job_output_dir(None, "job-1"),
            PathBuf::from("/data/outputs/default-ctx/job-1")
        );
    }

    #[test]
    fn job_output_url_trims_trailing_slash_and_joins_context() {
        let cfg = config();
        assert_eq!(cfg.job_output_url(Some("ctx"), "job-1"), "http://host/wpsoutputs/ctx/job-1");
        assert_eq!(cfg.job_output_url(None, "job-1"), "http://host/wpsoutputs/job-1");
    }
}
