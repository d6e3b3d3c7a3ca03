//! Durable stores for `Job`, `Process`, and `Service` records.
//!
//! An in-memory implementation of each trait ships by default. A PostgreSQL
//! implementation is available behind the `postgres` feature, storing each
//! record as a JSONB document alongside the handful of typed columns the
//! filter/sort/paginate operations need.

pub mod error;
pub mod job_store;
pub mod process_store;
pub mod service_store;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use error::StoreError;
pub use job_store::{InMemoryJobStore, JobFilter, JobSort, JobSortKey, JobStore, Page, SortDirection};
pub use process_store::{InMemoryProcessStore, ProcessStore};
pub use service_store::{InMemoryServiceStore, ServiceStore};

#[cfg(feature = "postgres")]
pub use postgres::{PostgresJobStore, PostgresProcessStore, PostgresServiceStore};
