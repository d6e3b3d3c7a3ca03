//! Orchestrates a full job from acceptance to a terminal state: loads the
//! process's package, resolves it into an executable plan, dispatches each
//! step to the adapter its requirements and the engine's mode select, and
//! merges per-step progress and results back into the job record and its
//! on-disk status documents.

pub mod adapter_factory;
pub mod error;
pub mod execution;
pub mod pool;
pub mod progress_sink;
pub mod select_adapter;

pub use adapter_factory::{AdapterFactory, DefaultAdapterFactory};
pub use error::EngineError;
pub use execution::ExecutionEngine;
pub use pool::EngineWorkerPool;
pub use progress_sink::JobProgressSink;
pub use select_adapter::{select_adapter, AdapterKind, ExecutionMode};
