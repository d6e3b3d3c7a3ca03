use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;
use weaver_contracts::{Job, JobStatus, Visibility};

use crate::error::StoreError;

/// Column `find_jobs` may sort on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSortKey {
    Created,
    Finished,
    Status,
    Process,
    Service,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy)]
pub struct JobSort {
    pub key: JobSortKey,
    pub direction: SortDirection,
}

impl Default for JobSort {
    fn default() -> Self {
        Self { key: JobSortKey::Created, direction: SortDirection::Descending }
    }
}

/// Filter for `find_jobs`; every field is an optional exact-match predicate.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub process: Option<String>,
    pub service: Option<String>,
    pub user_id: Option<String>,
    pub tag: Option<String>,
    pub access: Option<Visibility>,
}

impl JobFilter {
    fn matches(&self, job: &Job) -> bool {
        self.status.map(|s| s == job.status).unwrap_or(true)
            && self.process.as_deref().map(|p| p == job.process).unwrap_or(true)
            && self.service.as_deref().map(|s| Some(s) == job.service.as_deref()).unwrap_or(true)
            && self.user_id.as_deref().map(|u| Some(u) == job.user_id.as_deref()).unwrap_or(true)
            && self.access.map(|a| a == job.access).unwrap_or(true)
        // `tag` has no representative field on `Job` in this crate's data model; reserved
        // for stores that index a separate tags collection and is always accepted here.
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub offset: u32,
    pub limit: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self { offset: 0, limit: 100 }
    }
}

/// Durable job record store, per the job lifecycle design.
///
/// Implementations must honor the single-writer-per-job discipline: the
/// engine never issues concurrent writes for the same job id, so stores are
/// free to treat `update_job` as last-write-wins without their own locking.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn save_job(&self, job: Job) -> Result<(), StoreError>;
    async fn update_job(&self, job: Job) -> Result<(), StoreError>;
    async fn fetch_by_id(&self, id: Uuid) -> Result<Job, StoreError>;
    async fn find_jobs(
        &self,
        filter: JobFilter,
        sort: JobSort,
        page: Page,
    ) -> Result<(Vec<Job>, u64), StoreError>;

    /// Test-only: wipes every job record. Never called from the engine.
    async fn clear_jobs(&self) -> Result<(), StoreError>;
}

/// In-memory `JobStore`, the default store for this crate.
#[derive(Clone, Default)]
pub struct InMemoryJobStore {
    jobs: Arc<RwLock<HashMap<Uuid, Job>>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn save_job(&self, job: Job) -> Result<(), StoreError> {
        self.jobs.write().await.insert(job.id, job);
        Ok(())
    }

    async fn update_job(&self, job: Job) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        if !jobs.contains_key(&job.id) {
            return Err(StoreError::JobNotFound(job.id));
        }
        jobs.insert(job.id, job);
        Ok(())
    }

    async fn fetch_by_id(&self, id: Uuid) -> Result<Job, StoreError> {
        self.jobs.read().await.get(&id).cloned().ok_or(StoreError::JobNotFound(id))
    }

    async fn find_jobs(
        &self,
        filter: JobFilter,
        sort: JobSort,
        page: Page,
    ) -> Result<(Vec<Job>, u64), StoreError> {
        let jobs = self.jobs.read().await;
        let mut matched: Vec<Job> = jobs.values().filter(|j| filter.matches(j)).cloned().collect();

        matched.sort_by(|a, b| {
            let ord = match sort.key {
                JobSortKey::Created => a.created.cmp(&b.created),
                JobSortKey::Finished => a.finished.cmp(&b.finished),
                JobSortKey::Status => a.status.to_string().cmp(&b.status.to_string()),
                JobSortKey::Process => a.process.cmp(&b.process),
                JobSortKey::Service => a.service.cmp(&b.service),
                JobSortKey::User => a.user_id.cmp(&b.user_id),
            };
            match sort.direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            }
        });

        let total = matched.len() as u64;
        let start = (page.offset as usize).min(matched.len());
        let end = (start + page.limit as usize).min(matched.len());
        Ok((matched[start..end].to_vec(), total))
    }

    async fn clear_jobs(&self) -> Result<(), StoreError> {
        self.jobs.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(process: &str) -> Job {
        Job::new(process, true, false)
    }

    #[tokio::test]
    async fn save_then_fetch_round_trips() {
        let store = InMemoryJobStore::new();
        let j = job("p1");
        let id = j.id;
        store.save_job(j).await.unwrap();
        let fetched = store.fetch_by_id(id).await.unwrap();
        assert_eq!(fetched.process, "p1");
    }

    #[tokio::test]
    async fn update_requires_existing_record() {
        let store = InMemoryJobStore::new();
        let err = store.update_job(job("p1")).await.unwrap_err();
        assert!(matches!(err, StoreError::JobNotFound(_)));
    }

    #[tokio::test]
    async fn find_jobs_filters_by_status_and_paginates() {
        let store = InMemoryJobStore::new();
        for i in 0..5 {
            let mut j = job("p1");
            if i % 2 == 0 {
                j.transition(JobStatus::Running).unwrap();
            }
            store.save_job(j).await.unwrap();
        }
        let (running, total) = store
            .find_jobs(
                JobFilter { status: Some(JobStatus::Running), ..Default::default() },
                JobSort::default(),
                Page { offset: 0, limit: 100 },
            )
            .await
            .unwrap();
        assert_eq!(running.len(), 3);
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn clear_jobs_empties_the_store() {
        let store = InMemoryJobStore::new();
        store.save_job(job("p1")).await.unwrap();
        store.clear_jobs().await.unwrap();
        let (all, total) = store
            .find_jobs(JobFilter::default(), JobSort::default(), Page::default())
            .await
            .unwrap();
        assert!(all.is_empty());
        assert_eq!(total, 0);
    }
}
