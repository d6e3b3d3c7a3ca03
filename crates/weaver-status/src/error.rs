use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("failed to render {what}: {detail}")]
    Render { what: String, detail: String },

    #[error("failed to write status file {path}: {detail}")]
    Io { path: String, detail: String },
}
