//! Parses package descriptions (YAML/JSON, CWL-like), classifies them as an
//! application or a workflow, recursively resolves workflow step references
//! into an executable plan, and caches fetched remote packages.

pub mod cache;
pub mod fetcher;
pub mod model;
pub mod plan;

pub use cache::PackageCache;
pub use fetcher::HttpPackageFetcher;
pub use model::{PackageClass, PackageDescription, PackageError};
pub use plan::{Edge, Plan, PackageFetcher, PlanStep, StepIx};
