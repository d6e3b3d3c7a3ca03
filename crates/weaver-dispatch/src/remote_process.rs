use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use weaver_contracts::io::IoEntry;

use crate::error::AdapterError;
use crate::progress::{remap, schedule};

/// Opaque handle an adapter uses to resume polling a step it already
/// dispatched. Adapters define their own concrete payload by downcasting
/// through `Box<dyn std::any::Any + Send>`-style plumbing is avoided here —
/// instead each adapter carries the handle internally and `execute` never
/// inspects it, matching the "opaque `monitor_ref`" shape in the adapter
/// contract.
pub struct DispatchHandle(pub Box<dyn std::any::Any + Send>);

/// Observes progress as the fixed template advances through its hook points,
/// already remapped into the enclosing job's step window.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, progress: u8, message: &str);
}

/// A no-op sink for adapters exercised without an enclosing job (unit tests).
pub struct NullProgressSink;

#[async_trait]
impl ProgressSink for NullProgressSink {
    async fn report(&self, _progress: u8, _message: &str) {}
}

/// Common contract every remote process adapter implements. `execute` is the
/// fixed template described in the adapter design: subclasses override only
/// the hook points (`prepare`, `format_inputs`, `format_outputs`, `dispatch`,
/// `monitor`, `get_results`, `stage_results`, `cleanup`).
#[async_trait]
pub trait RemoteProcess: Send + Sync {
    /// Adapter-specific setup (e.g. resolving a client, validating config).
    /// Default is a no-op.
    async fn prepare(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    /// Identity by default; adapters override to reshape inputs into the
    /// dialect their remote endpoint expects.
    fn format_inputs(&self, inputs: &[IoEntry]) -> Result<Vec<IoEntry>, AdapterError> {
        Ok(inputs.to_vec())
    }

    /// Identity by default; adapters override to reshape the expected output
    /// descriptions into the dialect their remote endpoint expects.
    fn format_outputs(&self, outputs: &[IoEntry]) -> Result<Vec<IoEntry>, AdapterError> {
        Ok(outputs.to_vec())
    }

    async fn dispatch(&self, inputs: &[IoEntry], outputs: &[IoEntry]) -> Result<DispatchHandle, AdapterError>;

    /// Blocks until the remote step reaches a terminal state, reporting
    /// progress via `sink` as it polls. Returns `true` on success.
    async fn monitor(&self, handle: &DispatchHandle, sink: &dyn ProgressSink, cancel: &CancellationToken) -> Result<bool, AdapterError>;

    async fn get_results(&self, handle: &DispatchHandle) -> Result<Vec<IoEntry>, AdapterError>;

    async fn stage_results(&self, results: &[IoEntry], expected: &[IoEntry], out_dir: &Path) -> Result<Vec<IoEntry>, AdapterError>;

    /// Best-effort cancellation of an in-flight remote step, invoked by the
    /// engine's dismissal path (§5) when a running job is cancelled. Default
    /// is a no-op, matching adapters (WPS-1, local container) that have no
    /// way to stop what they already started; `APIProcessesAdapter` overrides
    /// this to issue a `DELETE` against the dispatched job's location.
    async fn dismiss(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn cleanup(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    /// The fixed template. Publishes the progress schedule pinned in the
    /// adapter design (prepare=2 .. completed=100), remapped into `[lo, hi]`
    /// via `progress::remap`, and always emits the `cleanup` update even when
    /// a hook fails, before propagating the original error.
    #[instrument(skip_all, fields(lo, hi))]
    async fn execute(
        &self,
        inputs: &[IoEntry],
        outputs: &[IoEntry],
        out_dir: &Path,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
        window: (u8, u8),
    ) -> Result<Vec<IoEntry>, AdapterError> {
        let (lo, hi) = window;
        let result = self.run_steps(inputs, outputs, out_dir, sink, cancel, lo, hi).await;

        sink.report(remap(schedule::CLEANUP, lo, hi), "cleanup").await;
        let cleanup_result = self.cleanup().await;

        let staged = result?;
        cleanup_result?;
        sink.report(remap(schedule::COMPLETED, lo, hi), "completed").await;
        Ok(staged)
    }

    async fn run_steps(
        &self,
        inputs: &[IoEntry],
        outputs: &[IoEntry],
        out_dir: &Path,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
        lo: u8,
        hi: u8,
    ) -> Result<Vec<IoEntry>, AdapterError> {
        sink.report(remap(schedule::PREPARE, lo, hi), "prepare").await;
        self.prepare().await?;

        sink.report(remap(schedule::READY, lo, hi), "ready").await;

        sink.report(remap(schedule::STAGE_IN, lo, hi), "stage-in").await;
        let formatted_inputs = self.format_inputs(inputs)?;

        sink.report(remap(schedule::FORMAT_IO, lo, hi), "format-io").await;
        let formatted_outputs = self.format_outputs(outputs)?;

        sink.report(remap(schedule::EXECUTE, lo, hi), "execute").await;
        let handle = self.dispatch(&formatted_inputs, &formatted_outputs).await?;

        sink.report(remap(schedule::MONITOR, lo, hi), "monitor").await;
        let success = self.monitor(&handle, sink, cancel).await?;
        if !success {
            return Err(AdapterError::RemoteJobFailed {
                service: "remote".to_string(),
                message: "monitor reported a non-zero terminal state".to_string(),
            });
        }

        sink.report(remap(schedule::RESULTS, lo, hi), "results").await;
        let results = self.get_results(&handle).await?;

        sink.report(remap(schedule::STAGE_OUT, lo, hi), "stage-out").await;
        self.stage_results(&results, outputs, out_dir).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingSink {
        reported: Mutex<Vec<u8>>,
    }

    #[async_trait]
    impl ProgressSink for RecordingSink {
        async fn report(&self, progress: u8, _message: &str) {
            self.reported.lock().unwrap().push(progress);
        }
    }

    struct AlwaysSucceeds;

    #[async_trait]
    impl RemoteProcess for AlwaysSucceeds {
        async fn dispatch(&self, _inputs: &[IoEntry], _outputs: &[IoEntry]) -> Result<DispatchHandle, AdapterError> {
            Ok(DispatchHandle(Box::new(())))
        }

        async fn monitor(&self, _handle: &DispatchHandle, _sink: &dyn ProgressSink, _cancel: &CancellationToken) -> Result<bool, AdapterError> {
            Ok(true)
        }

        async fn get_results(&self, _handle: &DispatchHandle) -> Result<Vec<IoEntry>, AdapterError> {
            Ok(Vec::new())
        }

        async fn stage_results(&self, results: &[IoEntry], _expected: &[IoEntry], _out_dir: &Path) -> Result<Vec<IoEntry>, AdapterError> {
            Ok(results.to_vec())
        }
    }

    struct FailsOnMonitor;

    #[async_trait]
    impl RemoteProcess for FailsOnMonitor {
        async fn dispatch(&self, _inputs: &[IoEntry], _outputs: &[IoEntry]) -> Result<DispatchHandle, AdapterError> {
            Ok(DispatchHandle(Box::new(())))
        }

        async fn monitor(&self, _handle: &DispatchHandle, _sink: &dyn ProgressSink, _cancel: &CancellationToken) -> Result<bool, AdapterError> {
            Err(AdapterError::Transport { service: "x".to_string(), detail: "boom".to_string() })
        }

        async fn get_results(&self, _handle: &DispatchHandle) -> Result<Vec<IoEntry>, AdapterError> {
            Ok(Vec::new())
        }

        async fn stage_results(&self, results: &[IoEntry], _expected: &[IoEntry], _out_dir: &Path) -> Result<Vec<IoEntry>, AdapterError> {
            Ok(results.to_vec())
        }
    }

    #[tokio::test]
    async fn execute_publishes_the_full_schedule_remapped_into_the_window() {
        let adapter = AlwaysSucceeds;
        let sink = RecordingSink { reported: Mutex::new(Vec::new()) };
        let cancel = CancellationToken::new();
        let dir = tempfile::tempdir().unwrap();

        let result = adapter.execute(&[], &[], dir.path(), &sink, &cancel, (20, 80)).await;
        assert!(result.is_ok());

        let reported = sink.reported.lock().unwrap();
        assert_eq!(*reported.first().unwrap(), remap(schedule::PREPARE, 20, 80));
        assert_eq!(*reported.last().unwrap(), remap(schedule::COMPLETED, 20, 80));
        assert!(reported.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn execute_still_reports_cleanup_when_a_hook_fails() {
        let adapter = FailsOnMonitor;
        let sink = RecordingSink { reported: Mutex::new(Vec::new()) };
        let cancel = CancellationToken::new();
        let dir = tempfile::tempdir().unwrap();

        let result = adapter.execute(&[], &[], dir.path(), &sink, &cancel, (0, 100)).await;
        assert!(result.is_err());

        let reported = sink.reported.lock().unwrap();
        assert!(reported.contains(&schedule::CLEANUP));
        assert!(!reported.contains(&schedule::COMPLETED));
    }
}
