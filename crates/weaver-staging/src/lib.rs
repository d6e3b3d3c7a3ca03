//! The I/O staging subsystem: resolves input references into a step working
//! directory, publishes outputs through the public output URL, and maps
//! between `location`-based and `href`/`value`-based I/O shapes.

pub mod config;
pub mod context;
pub mod error;
pub mod fetch;
pub mod input;
pub mod output;

pub use config::{StagingConfig, OPENSEARCH_LOCAL_FILE_SCHEME};
pub use context::validate_output_context;
pub use error::StagingError;
pub use input::{stage_inputs, StagedInput, StagedValue};
pub use output::{host_file, path_to_url, stage_outputs, url_to_path, ProducedOutput};
