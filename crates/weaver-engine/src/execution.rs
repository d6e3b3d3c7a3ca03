use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};
use uuid::Uuid;

use weaver_contracts::error::ErrorCode;
use weaver_contracts::io::{IoEntry, IoValue};
use weaver_contracts::job::{Exception, LogLine};
use weaver_contracts::{Job, JobStatus, WeaverError};
use weaver_dispatch::progress::{schedule, step_window};
use weaver_dispatch::{AdapterError, RemoteProcess};
use weaver_package::{resolve_plan, PackageDescription, PackageFetcher, Plan, PlanStep, StepIx};
use weaver_staging::{stage_inputs, stage_outputs, ProducedOutput, StagedValue, StagingConfig};
use weaver_status::StatusBridge;
use weaver_storage::{JobStore, ProcessStore};

use crate::adapter_factory::AdapterFactory;
use crate::error::EngineError;
use crate::progress_sink::JobProgressSink;
use crate::select_adapter::{select_adapter, ExecutionMode};

/// Fraction of the job's progress range given to plan resolution, before any
/// step's own window opens; the remainder above `CWL_DONE` is left for the
/// terminal transition itself (`Job::transition` pins `Succeeded` to 100).
const PLAN_LOADED: u8 = 2;
const CWL_START: u8 = 5;
const CWL_DONE: u8 = 95;

/// Orchestrates a single job end to end: loads its process's package,
/// resolves the executable plan, dispatches each step through the adapter
/// its requirements and the engine's mode select, and folds per-step results
/// and progress back into the job record.
///
/// One `ExecutionEngine` is shared across every worker task the surrounding
/// `EngineWorkerPool` spawns; all mutable state lives in the injected stores,
/// so this type itself is `Clone`-free and stateless beyond its collaborators.
pub struct ExecutionEngine {
    pub job_store: Arc<dyn JobStore>,
    pub process_store: Arc<dyn ProcessStore>,
    pub status_bridge: Arc<StatusBridge>,
    pub staging_config: Arc<StagingConfig>,
    pub adapter_factory: Arc<dyn AdapterFactory>,
    pub package_fetcher: Arc<dyn PackageFetcher>,
    pub http_client: reqwest::Client,
    pub mode: ExecutionMode,
}

impl ExecutionEngine {
    pub fn new(
        job_store: Arc<dyn JobStore>,
        process_store: Arc<dyn ProcessStore>,
        status_bridge: Arc<StatusBridge>,
        staging_config: Arc<StagingConfig>,
        adapter_factory: Arc<dyn AdapterFactory>,
        package_fetcher: Arc<dyn PackageFetcher>,
        http_client: reqwest::Client,
        mode: ExecutionMode,
    ) -> Self {
        Self {
            job_store,
            process_store,
            status_bridge,
            staging_config,
            adapter_factory,
            package_fetcher,
            http_client,
            mode,
        }
    }

    /// Runs `job_id` to completion. Never returns an `Err` for a failure that
    /// belongs to the job itself (package errors, adapter errors, a dismissal
    /// request) — those are recorded on the job record and its status
    /// documents, and this returns `Ok(())`. An `Err` here means the engine's
    /// own collaborators (the stores, the status bridge) are unavailable,
    /// which the caller's worker-pool task can only log.
    #[instrument(skip(self, cancel), fields(job_id = %job_id))]
    pub async fn execute_job(&self, job_id: Uuid, cancel: CancellationToken) -> Result<(), EngineError> {
        let mut job = self.job_store.fetch_by_id(job_id).await?;
        let process = self.process_store.fetch_by_id(&job.process).await?;

        let package: PackageDescription = match serde_json::from_value(process.package.clone()) {
            Ok(p) => p,
            Err(e) => {
                return self
                    .fail_job(job, EngineError::Package(weaver_package::PackageError::ParseError(e.to_string())))
                    .await;
            }
        };

        job.transition(JobStatus::Running)?;
        job.set_progress(schedule::START);
        let log_line = LogLine::new("INFO", "engine", "job accepted for execution");
        job.push_log(log_line.clone());
        self.job_store.update_job(job.clone()).await?;
        self.status_bridge.write_status(&job).await?;
        self.status_bridge.append_logs(&job, &[log_line]).await?;

        let plan = match resolve_plan(package, self.package_fetcher.as_ref()).await {
            Ok(plan) => plan,
            Err(e) => return self.fail_job(job, EngineError::Package(e)).await,
        };

        job.set_progress(PLAN_LOADED);
        let log_line = LogLine::new("INFO", "engine", format!("plan resolved: {} step(s)", plan.steps.len()));
        job.push_log(log_line.clone());
        self.job_store.update_job(job.clone()).await?;
        self.status_bridge.write_status(&job).await?;
        self.status_bridge.append_logs(&job, &[log_line]).await?;

        let total_steps = plan.steps.len().max(1) as u32;
        let mut step_results: HashMap<StepIx, Vec<IoEntry>> = HashMap::new();
        let mut final_results: Vec<IoEntry> = Vec::new();

        for (idx, step) in plan.steps.iter().enumerate() {
            if cancel.is_cancelled() {
                return self.dismiss_job(job, None).await;
            }

            let step_ix = StepIx(idx as u32);
            let bound_inputs = resolve_step_inputs(&plan, step_ix, &job.inputs, &step_results);

            let workdir = self.staging_config.workdir.join(job_id.to_string()).join(&step.name);
            if let Err(e) = tokio::fs::create_dir_all(&workdir).await {
                return self
                    .fail_job(job, EngineError::Io { path: workdir.display().to_string(), detail: e.to_string() })
                    .await;
            }

            let staged = match stage_inputs(&self.http_client, &bound_inputs, &workdir).await {
                Ok(s) => s,
                Err(e) => return self.fail_job(job, EngineError::Staging(e)).await,
            };
            let staged_entries: Vec<IoEntry> = staged.into_iter().map(staged_input_to_entry).collect();

            let kind = match select_adapter(
                step.package.has_requirement("WPS1Requirement"),
                step.package.has_requirement("ESGF-CWTRequirement"),
                self.mode,
            ) {
                Ok(kind) => kind,
                Err(e) => return self.fail_job(job, e).await,
            };

            let process_id = if step.name == "__root__" { job.process.clone() } else { step.name.clone() };
            let adapter = match self
                .adapter_factory
                .build(kind, step, &process_id, &staged_entries, workdir.clone())
                .await
            {
                Ok(a) => a,
                Err(e) => return self.fail_job(job, e).await,
            };

            let declared_outputs: Vec<IoEntry> = step
                .package
                .outputs
                .iter()
                .map(|o| IoEntry { id: o.id.clone(), value: IoValue::Value { value: serde_json::Value::Null } })
                .collect();

            let window = step_window((idx + 1) as u32, total_steps, CWL_START, CWL_DONE);
            let sink = JobProgressSink { job_store: self.job_store.clone(), status_bridge: self.status_bridge.clone(), job_id };
            let out_dir = workdir.join("out");

            info!(step = %step.name, "dispatching step");
            match adapter.execute(&staged_entries, &declared_outputs, &out_dir, &sink, &cancel, window).await {
                Ok(results) => {
                    let published = match self.publish_outputs(&results, &job_id.to_string()).await {
                        Ok(p) => p,
                        Err(e) => return self.fail_job(job, e).await,
                    };
                    step_results.insert(step_ix, published.clone());
                    final_results = published;

                    job = self.job_store.fetch_by_id(job_id).await?;
                    job.push_log(LogLine::new("INFO", "engine", format!("step {} succeeded", step.name)));
                    self.job_store.update_job(job.clone()).await?;
                }
                Err(AdapterError::Cancelled) => {
                    let _ = adapter.dismiss().await;
                    return self.dismiss_job(job, Some(adapter.as_ref())).await;
                }
                Err(e) => {
                    error!(step = %step.name, error = %e, "step failed");
                    return self.fail_job(job, EngineError::Adapter(e)).await;
                }
            }
        }

        job = self.job_store.fetch_by_id(job_id).await?;
        job.results = final_results;
        job.transition(JobStatus::Succeeded)?;
        let log_line = LogLine::new("INFO", "engine", "job succeeded");
        job.push_log(log_line.clone());
        self.job_store.update_job(job.clone()).await?;
        self.status_bridge.write_status(&job).await?;
        self.status_bridge.append_logs(&job, &[log_line]).await?;
        Ok(())
    }

    /// Republishes any step result whose value is a local `file://` path
    /// under the job's public output directory, leaving already-remote hrefs
    /// and literal values untouched. A local-container step's results are
    /// always local paths; a WPS-1 or API-Processes step's results are
    /// already remote and pass through here unchanged.
    async fn publish_outputs(&self, results: &[IoEntry], job_id: &str) -> Result<Vec<IoEntry>, EngineError> {
        let mut to_stage = Vec::new();
        for (position, entry) in results.iter().enumerate() {
            if let IoValue::Href { href, .. } = &entry.value {
                if let Some(path) = href.strip_prefix("file://") {
                    to_stage.push((position, ProducedOutput { id: entry.id.clone(), local_path: PathBuf::from(path) }));
                }
            }
        }
        if to_stage.is_empty() {
            return Ok(results.to_vec());
        }

        let produced: Vec<ProducedOutput> = to_stage.iter().map(|(_, p)| p.clone()).collect();
        let staged = stage_outputs(&produced, &self.staging_config, None, job_id).await?;

        let mut out = results.to_vec();
        for ((position, _), staged_entry) in to_stage.into_iter().zip(staged.into_iter()) {
            out[position] = staged_entry;
        }
        Ok(out)
    }

    /// Records `err` on the job as a single exception, transitions it to a
    /// terminal failed state, and writes the final status document. Returns
    /// `Ok(())` unless the stores themselves are unreachable.
    async fn fail_job(&self, mut job: Job, err: EngineError) -> Result<(), EngineError> {
        let weaver_err: WeaverError = err.into();
        job.exceptions.push(Exception {
            code: format!("{:?}", weaver_err.code),
            locator: weaver_err.locator.clone(),
            text: weaver_err.message.clone(),
        });
        job.status_message = Some(weaver_err.message.clone());

        let target = match weaver_err.code {
            ErrorCode::NotImplemented => JobStatus::Exception,
            _ => JobStatus::Failed,
        };
        let _ = job.transition(target);
        let log_line = LogLine::new("ERROR", "engine", weaver_err.message.clone());
        job.push_log(log_line.clone());

        self.job_store.update_job(job.clone()).await?;
        self.status_bridge.write_status(&job).await?;
        self.status_bridge.append_logs(&job, &[log_line]).await?;
        Ok(())
    }

    /// Transitions the job to `Dismissed`. `adapter` is the step's adapter
    /// when one had already been built and dismissed by the caller — kept as
    /// a parameter only so a future caller can attach the log line below to
    /// whether the remote acknowledged the dismissal; callers that dismiss
    /// before building any adapter pass `None`.
    async fn dismiss_job(&self, mut job: Job, adapter: Option<&dyn RemoteProcess>) -> Result<(), EngineError> {
        let message = if adapter.is_some() {
            "job dismissed; best-effort cancellation sent to the in-flight step"
        } else {
            "job dismissed before any step was dispatched"
        };
        let log_line = LogLine::new("INFO", "engine", message);
        job.push_log(log_line.clone());
        let _ = job.transition(JobStatus::Dismissed);

        self.job_store.update_job(job.clone()).await?;
        self.status_bridge.write_status(&job).await?;
        self.status_bridge.append_logs(&job, &[log_line]).await?;
        Ok(())
    }
}

fn staged_input_to_entry(staged: weaver_staging::StagedInput) -> IoEntry {
    match staged.value {
        StagedValue::LocalPath(path) => {
            IoEntry { id: staged.id, value: IoValue::Href { href: format!("file://{}", path.display()), mime_type: None } }
        }
        StagedValue::Literal(value) => IoEntry { id: staged.id, value: IoValue::Value { value } },
    }
}

/// Binds one step's declared inputs to realized values: a single-step plan
/// (an application, or a one-step workflow) draws every input straight from
/// the job's own submitted inputs; a multi-step workflow resolves each
/// declared input against the plan's edges first (wiring it to an earlier
/// step's already-computed result) and falls back to the job's inputs for
/// any id with no edge, treating it as a direct pass-through of a top-level
/// workflow input.
fn resolve_step_inputs(
    plan: &Plan,
    step_ix: StepIx,
    job_inputs: &[IoEntry],
    step_results: &HashMap<StepIx, Vec<IoEntry>>,
) -> Vec<IoEntry> {
    let step: &PlanStep = &plan.steps[step_ix.0 as usize];
    if plan.steps.len() == 1 {
        return job_inputs.to_vec();
    }

    step.package
        .inputs
        .iter()
        .filter_map(|declared| {
            let wired = plan
                .edges
                .iter()
                .find(|edge| edge.to == (step_ix, declared.id.clone()))
                .and_then(|edge| step_results.get(&edge.from.0).and_then(|outputs| outputs.iter().find(|o| o.id == edge.from.1)));

            wired.cloned().or_else(|| job_inputs.iter().find(|i| i.id == declared.id).cloned())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use weaver_package::Edge;

    fn package(class: &str) -> PackageDescription {
        serde_json::from_value(serde_json::json!({ "class": class, "inputs": [], "outputs": [] })).unwrap()
    }

    fn entry(id: &str, value: serde_json::Value) -> IoEntry {
        IoEntry { id: id.to_string(), value: IoValue::Value { value } }
    }

    #[test]
    fn single_step_plan_passes_job_inputs_through_directly() {
        let plan = Plan { root: package("CommandLineTool"), steps: vec![PlanStep { name: "__root__".to_string(), package: package("CommandLineTool") }], edges: vec![] };
        let job_inputs = vec![entry("a", serde_json::json!(1))];
        let bound = resolve_step_inputs(&plan, StepIx(0), &job_inputs, &HashMap::new());
        assert_eq!(bound, job_inputs);
    }

    #[test]
    fn workflow_step_prefers_a_wired_edge_over_a_job_input_of_the_same_id() {
        let mut s1 = package("CommandLineTool");
        let mut s2 = package("CommandLineTool");
        s2.inputs.push(weaver_contracts::io::PackageIo::new("x", weaver_contracts::io::PackageType::String));
        s1.outputs.push(weaver_contracts::io::PackageIo::new("out", weaver_contracts::io::PackageType::String));

        let plan = Plan {
            root: package("Workflow"),
            steps: vec![PlanStep { name: "s1".to_string(), package: s1 }, PlanStep { name: "s2".to_string(), package: s2 }],
            edges: vec![Edge { from: (StepIx(0), "out".to_string()), to: (StepIx(1), "x".to_string()) }],
        };

        let mut step_results = HashMap::new();
        step_results.insert(StepIx(0), vec![entry("out", serde_json::json!("from-step-1"))]);
        let job_inputs = vec![entry("x", serde_json::json!("from-job"))];

        let bound = resolve_step_inputs(&plan, StepIx(1), &job_inputs, &step_results);
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].value, IoValue::Value { value: serde_json::json!("from-step-1") });
    }

    #[test]
    fn workflow_step_falls_back_to_a_direct_job_input_without_an_edge() {
        let mut s1 = package("CommandLineTool");
        s1.inputs.push(weaver_contracts::io::PackageIo::new("passthrough", weaver_contracts::io::PackageType::String));

        let plan = Plan {
            root: package("Workflow"),
            steps: vec![PlanStep { name: "s0".to_string(), package: package("CommandLineTool") }, PlanStep { name: "s1".to_string(), package: s1 }],
            edges: vec![],
        };
        let job_inputs = vec![entry("passthrough", serde_json::json!("top-level"))];

        let bound = resolve_step_inputs(&plan, StepIx(1), &job_inputs, &HashMap::new());
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].id, "passthrough");
    }
}
