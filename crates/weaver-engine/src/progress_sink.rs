use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;
use weaver_contracts::job::LogLine;
use weaver_dispatch::ProgressSink;
use weaver_status::StatusBridge;
use weaver_storage::JobStore;

/// Bridges adapter-reported progress into the job record and its on-disk
/// status files. Reads, mutates, and writes back the job on every report —
/// safe because the engine guarantees a single worker per job id (§5).
pub struct JobProgressSink {
    pub job_store: Arc<dyn JobStore>,
    pub status_bridge: Arc<StatusBridge>,
    pub job_id: Uuid,
}

#[async_trait]
impl ProgressSink for JobProgressSink {
    async fn report(&self, progress: u8, message: &str) {
        let Ok(mut job) = self.job_store.fetch_by_id(self.job_id).await else { return };
        job.set_progress(progress);
        let log_line = LogLine::new("INFO", "engine", message);
        job.push_log(log_line.clone());
        if self.job_store.update_job(job.clone()).await.is_ok() {
            let _ = self.status_bridge.write_status(&job).await;
            let _ = self.status_bridge.append_logs(&job, &[log_line]).await;
        }
    }
}
