use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Bounded concurrency for job execution: one worker task per claimed job,
/// capped by a semaphore sized to the worker-pool capacity (default = CPU
/// count). Grounded in the teacher's `durable::worker::pool::WorkerPool`
/// shape, trimmed to this crate's single-process, single-node needs — no
/// distributed poller/heartbeat/reclaim loops, since job claiming here is an
/// in-process `JobStore` read, not a cross-worker lease.
pub struct EngineWorkerPool {
    semaphore: Arc<Semaphore>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    cancellations: std::sync::Mutex<HashMap<Uuid, CancellationToken>>,
}

impl EngineWorkerPool {
    pub fn new(max_concurrency: usize) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
            shutdown_tx,
            shutdown_rx,
            cancellations: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Sizes the pool to the host's CPU count, per the default in the
    /// concurrency model.
    pub fn with_default_capacity() -> Self {
        Self::new(num_cpus::get())
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Registers a fresh cancellation token for `job_id`, replacing any
    /// stale one from a previous run, and returns a clone for the spawned
    /// task to observe.
    pub fn register_job(&self, job_id: Uuid) -> CancellationToken {
        let token = CancellationToken::new();
        self.cancellations.lock().unwrap().insert(job_id, token.clone());
        token
    }

    pub fn cancel_job(&self, job_id: Uuid) -> bool {
        match self.cancellations.lock().unwrap().get(&job_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn unregister_job(&self, job_id: Uuid) {
        self.cancellations.lock().unwrap().remove(&job_id);
    }

    /// Acquires a permit, registers the job's cancellation token, and spawns
    /// `work` as a single `tokio::spawn`ed task. Returns immediately once the
    /// permit is held and the task is spawned — callers don't await
    /// completion here, matching the per-job single-writer discipline (the
    /// job's own worker task is the only writer for its record).
    #[instrument(skip(self, work))]
    pub async fn spawn_job<F, Fut>(&self, job_id: Uuid, work: F)
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let permit = self.semaphore.clone().acquire_owned().await.expect("semaphore is never closed");
        let token = self.register_job(job_id);

        tokio::spawn({
            let token_for_task = token.clone();
            async move {
                work(token_for_task).await;
                drop(permit);
            }
        });
    }

    /// Signals shutdown and cancels every in-flight job's token; callers
    /// waiting on `spawn_job` permits are not forcibly interrupted, only
    /// asked to wind down via their `CancellationToken`.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let tokens: Vec<CancellationToken> = self.cancellations.lock().unwrap().values().cloned().collect();
        for token in tokens {
            token.cancel();
        }
        debug!("engine worker pool shutdown signaled");
    }

    pub fn finish_job(&self, job_id: Uuid) {
        self.unregister_job(job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn spawn_job_runs_the_supplied_work() {
        let pool = EngineWorkerPool::new(2);
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = ran.clone();
        let job_id = Uuid::new_v4();

        pool.spawn_job(job_id, move |_cancel| async move {
            ran_clone.fetch_add(1, Ordering::SeqCst);
        })
        .await;

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancel_job_triggers_the_registered_token() {
        let pool = EngineWorkerPool::new(2);
        let job_id = Uuid::new_v4();
        let token = pool.register_job(job_id);
        assert!(pool.cancel_job(job_id));
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cancel_job_is_false_for_unknown_ids() {
        let pool = EngineWorkerPool::new(2);
        assert!(!pool.cancel_job(Uuid::new_v4()));
    }

    #[tokio::test]
    async fn shutdown_cancels_every_registered_job() {
        let pool = EngineWorkerPool::new(2);
        let job_id = Uuid::new_v4();
        let token = pool.register_job(job_id);
        pool.shutdown().await;
        assert!(token.is_cancelled());
        assert!(pool.is_shutting_down());
    }
}
