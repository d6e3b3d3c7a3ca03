#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("fetch failed for {url}: {detail}")]
    Fetch { url: String, detail: String },

    #[error("io error staging {path}: {detail}")]
    Io { path: String, detail: String },

    #[error("path {0} falls outside the configured output directory")]
    OutsideOutputDir(String),

    #[error("invalid X-WPS-Output-Context value: {0}")]
    InvalidOutputContext(String),

    #[error("unsupported href scheme: {0}")]
    UnsupportedScheme(String),
}
