use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use weaver_contracts::{Process, Visibility};

use crate::error::StoreError;

/// Durable, shared `Process` record store.
///
/// A `Process` is read-only after deployment from the point of view of any
/// job referencing it; mutation (`update_process`/`delete_process`) is
/// admin-only and not invoked by the execution engine.
#[async_trait]
pub trait ProcessStore: Send + Sync {
    async fn create_process(&self, process: Process) -> Result<(), StoreError>;
    async fn update_process(&self, process: Process) -> Result<(), StoreError>;
    async fn fetch_by_id(&self, id: &str) -> Result<Process, StoreError>;
    async fn list_processes(&self, visibility: Option<Visibility>) -> Result<Vec<Process>, StoreError>;
    async fn delete_process(&self, id: &str) -> Result<(), StoreError>;
}

#[derive(Clone, Default)]
pub struct InMemoryProcessStore {
    processes: Arc<RwLock<HashMap<String, Process>>>,
}

impl InMemoryProcessStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProcessStore for InMemoryProcessStore {
    async fn create_process(&self, process: Process) -> Result<(), StoreError> {
        let mut processes = self.processes.write().await;
        if processes.contains_key(&process.id) {
            return Err(StoreError::ProcessAlreadyExists(process.id));
        }
        processes.insert(process.id.clone(), process);
        Ok(())
    }

    async fn update_process(&self, process: Process) -> Result<(), StoreError> {
        let mut processes = self.processes.write().await;
        if !processes.contains_key(&process.id) {
            return Err(StoreError::ProcessNotFound(process.id));
        }
        processes.insert(process.id.clone(), process);
        Ok(())
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Process, StoreError> {
        self.processes
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::ProcessNotFound(id.to_string()))
    }

    async fn list_processes(&self, visibility: Option<Visibility>) -> Result<Vec<Process>, StoreError> {
        let processes = self.processes.read().await;
        Ok(processes
            .values()
            .filter(|p| visibility.map(|v| v == p.visibility).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn delete_process(&self, id: &str) -> Result<(), StoreError> {
        self.processes
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::ProcessNotFound(id.to_string()))
    }
}
