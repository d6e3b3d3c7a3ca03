use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::io::IoEntry;

/// Job status, per the state machine in the job lifecycle design.
///
/// Allowed transitions are enforced by `weaver-storage`'s `JobStore`, not by
/// this type — the enum only names the reachable states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Accepted,
    Running,
    Succeeded,
    Failed,
    Dismissed,
    Exception,
    Unknown,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Dismissed | JobStatus::Exception
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Accepted => "accepted",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Dismissed => "dismissed",
            JobStatus::Exception => "exception",
            JobStatus::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

/// A single formatted log line. Stored pre-formatted (timestamp, level,
/// logger name, message) so the auxiliary `.log` file can append it verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub logger: String,
    pub message: String,
}

impl LogLine {
    pub fn new(level: impl Into<String>, logger: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level: level.into(),
            logger: logger.into(),
            message: message.into(),
        }
    }

    /// The single rendered line, matching the `.log` file's on-disk format.
    pub fn render(&self) -> String {
        format!(
            "{} {} [{}] {}",
            self.timestamp.to_rfc3339(),
            self.level,
            self.logger,
            self.message
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Exception {
    pub code: String,
    pub locator: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ExecuteMode {
    Sync,
    Async,
}

/// A single execution of a process (or a registered provider's process).
///
/// Mutation goes exclusively through the methods here: they enforce the
/// progress-monotonicity and duplicate-log-suppression invariants so that
/// every store implementation gets them for free.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub task_id: Uuid,
    pub process: String,
    pub service: Option<String>,
    pub user_id: Option<String>,

    pub status: JobStatus,
    pub progress: u8,
    pub status_message: Option<String>,

    pub logs: Vec<LogLine>,
    pub exceptions: Vec<Exception>,

    pub inputs: Vec<IoEntry>,
    pub results: Vec<IoEntry>,

    pub created: DateTime<Utc>,
    pub finished: Option<DateTime<Utc>>,

    pub execute_async: bool,
    pub is_workflow: bool,
    pub access: Visibility,
    pub notification_email: Option<String>,

    pub request: Option<String>,
    pub response: Option<String>,
    pub status_location: Option<String>,
    /// Stable identifier exposed to legacy WPS clients; equals `id` unless an
    /// external scheduler assigns its own handle.
    pub wps_id: Uuid,
}

impl Job {
    pub fn new(process: impl Into<String>, execute_async: bool, is_workflow: bool) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            task_id: id,
            process: process.into(),
            service: None,
            user_id: None,
            status: JobStatus::Accepted,
            progress: 0,
            status_message: None,
            logs: Vec::new(),
            exceptions: Vec::new(),
            inputs: Vec::new(),
            results: Vec::new(),
            created: Utc::now(),
            finished: None,
            execute_async,
            is_workflow,
            access: Visibility::Private,
            notification_email: None,
            request: None,
            response: None,
            status_location: None,
            wps_id: id,
        }
    }

    /// Appends a log line unless it is identical to the last one recorded.
    pub fn push_log(&mut self, line: LogLine) {
        if self.logs.last().map(|l| l.message == line.message).unwrap_or(false) {
            return;
        }
        self.logs.push(line);
    }

    /// Applies a progress update, clamping to the non-decreasing invariant.
    /// Values above 100 are rejected entirely (returns `false`), matching the
    /// `[0, 100]` range check on the original `progress` setter.
    pub fn set_progress(&mut self, progress: u8) -> bool {
        if progress > 100 {
            return false;
        }
        if self.status.is_terminal() {
            return false;
        }
        self.progress = self.progress.max(progress);
        true
    }

    pub fn transition(&mut self, status: JobStatus) -> Result<(), crate::WeaverError> {
        use crate::error::ErrorCode;
        if self.status.is_terminal() {
            return Err(crate::WeaverError::new(
                ErrorCode::PackageExecutionError,
                format!("cannot transition terminal job out of {}", self.status),
            ));
        }
        let allowed = matches!(
            (self.status, status),
            (JobStatus::Accepted, JobStatus::Running)
                | (JobStatus::Accepted, JobStatus::Dismissed)
                | (JobStatus::Running, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Succeeded)
                | (JobStatus::Running, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Exception)
                | (JobStatus::Running, JobStatus::Dismissed)
        );
        if !allowed {
            return Err(crate::WeaverError::new(
                ErrorCode::PackageExecutionError,
                format!("illegal transition {} -> {}", self.status, status),
            ));
        }
        self.status = status;
        if status.is_terminal() {
            self.finished = Some(Utc::now());
            if status == JobStatus::Succeeded {
                self.progress = 100;
            }
        }
        Ok(())
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished.unwrap_or_else(Utc::now) - self.created
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_job_starts_accepted_with_matching_task_and_wps_id() {
        let job = Job::new("proc-a", true, false);
        assert_eq!(job.status, JobStatus::Accepted);
        assert_eq!(job.progress, 0);
        assert_eq!(job.task_id, job.id);
        assert_eq!(job.wps_id, job.id);
        assert!(job.finished.is_none());
    }

    #[test]
    fn set_progress_is_non_decreasing() {
        let mut job = Job::new("proc-a", true, false);
        job.transition(JobStatus::Running).unwrap();
        assert!(job.set_progress(10));
        assert_eq!(job.progress, 10);
        assert!(job.set_progress(5));
        assert_eq!(job.progress, 10, "progress must never go backwards");
        assert!(job.set_progress(50));
        assert_eq!(job.progress, 50);
    }

    #[test]
    fn set_progress_rejects_out_of_range_values() {
        let mut job = Job::new("proc-a", true, false);
        job.transition(JobStatus::Running).unwrap();
        assert!(!job.set_progress(101));
        assert_eq!(job.progress, 0);
    }

    #[test]
    fn set_progress_is_rejected_once_terminal() {
        let mut job = Job::new("proc-a", true, false);
        job.transition(JobStatus::Running).unwrap();
        job.set_progress(40);
        job.transition(JobStatus::Failed).unwrap();
        assert!(!job.set_progress(90));
        assert_eq!(job.progress, 40, "terminal jobs preserve their last progress");
    }

    #[test]
    fn push_log_suppresses_identical_consecutive_lines() {
        let mut job = Job::new("proc-a", true, false);
        job.push_log(LogLine::new("INFO", "engine", "starting"));
        job.push_log(LogLine::new("INFO", "engine", "starting"));
        job.push_log(LogLine::new("INFO", "engine", "still starting"));
        job.push_log(LogLine::new("INFO", "engine", "still starting"));
        job.push_log(LogLine::new("INFO", "engine", "starting"));
        assert_eq!(job.logs.len(), 3, "only consecutive duplicates are suppressed");
    }

    #[test]
    fn terminal_transitions_set_finished_and_clamp_progress() {
        let mut job = Job::new("proc-a", true, false);
        job.transition(JobStatus::Running).unwrap();
        job.set_progress(37);
        job.transition(JobStatus::Failed).unwrap();
        assert!(job.finished.is_some());
        assert_eq!(job.progress, 37, "failure preserves the last recorded progress");

        let mut succeeded = Job::new("proc-a", true, false);
        succeeded.transition(JobStatus::Running).unwrap();
        succeeded.set_progress(60);
        succeeded.transition(JobStatus::Succeeded).unwrap();
        assert_eq!(succeeded.progress, 100);
        assert!(succeeded.finished.is_some());
    }

    #[test]
    fn transition_out_of_a_terminal_state_is_rejected() {
        let mut job = Job::new("proc-a", true, false);
        job.transition(JobStatus::Running).unwrap();
        job.transition(JobStatus::Succeeded).unwrap();
        let err = job.transition(JobStatus::Running).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::PackageExecutionError);
        assert_eq!(job.status, JobStatus::Succeeded);
    }

    #[test]
    fn accepted_can_be_dismissed_without_running_first() {
        let mut job = Job::new("proc-a", true, false);
        job.transition(JobStatus::Dismissed).unwrap();
        assert_eq!(job.status, JobStatus::Dismissed);
        assert!(job.finished.is_some());
    }

    #[test]
    fn accepted_cannot_jump_directly_to_succeeded() {
        let mut job = Job::new("proc-a", true, false);
        assert!(job.transition(JobStatus::Succeeded).is_err());
        assert_eq!(job.status, JobStatus::Accepted);
    }

    #[test]
    fn running_to_exception_populates_terminal_state() {
        let mut job = Job::new("proc-a", true, false);
        job.transition(JobStatus::Running).unwrap();
        job.exceptions.push(Exception {
            code: "PackageExecutionError".to_string(),
            locator: None,
            text: "boom".to_string(),
        });
        job.transition(JobStatus::Exception).unwrap();
        assert!(job.status.is_terminal());
        assert_eq!(job.exceptions.len(), 1);
    }

    #[test]
    fn duration_matches_finished_minus_created() {
        let mut job = Job::new("proc-a", true, false);
        job.transition(JobStatus::Running).unwrap();
        job.transition(JobStatus::Succeeded).unwrap();
        let expected = job.finished.unwrap() - job.created;
        assert_eq!(job.duration(), expected);
    }
}
