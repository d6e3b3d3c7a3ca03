use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use uuid::Uuid;
use weaver_contracts::job::{Job, LogLine};

use crate::error::StatusError;
use crate::xml::render_execute_response;

const XML_WRITE_THROTTLE: Duration = Duration::from_secs(2);

/// Writes the status file pair (`<id>.xml`, `<id>.log`) under `wps_output_dir`
/// for both a job's own id and its `wps_id` alias, throttling XML rewrites
/// to at most once every 2 seconds except on terminal transitions.
pub struct StatusBridge {
    output_dir: PathBuf,
    output_url: String,
    last_xml_write: Mutex<HashMap<Uuid, Instant>>,
}

impl StatusBridge {
    pub fn new(output_dir: PathBuf, output_url: String) -> Self {
        Self { output_dir, output_url, last_xml_write: Mutex::new(HashMap::new()) }
    }

    fn status_location(&self, id: Uuid) -> String {
        format!("{}/{id}.xml", self.output_url.trim_end_matches('/'))
    }

    fn xml_path(&self, id: Uuid) -> PathBuf {
        self.output_dir.join(format!("{id}.xml"))
    }

    fn log_path(&self, id: Uuid) -> PathBuf {
        self.output_dir.join(format!("{id}.log"))
    }

    /// Writes the XML status document for `job.id` and its `wps_id` alias,
    /// honoring the throttle unless `job.status` is terminal.
    pub async fn write_status(&self, job: &Job) -> Result<(), StatusError> {
        let is_terminal = job.status.is_terminal();
        if !is_terminal && !self.should_write(job.id) {
            return Ok(());
        }

        let xml = render_execute_response(job, &self.status_location(job.id))?;
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| StatusError::Io { path: self.output_dir.display().to_string(), detail: e.to_string() })?;

        self.write_file(&self.xml_path(job.id), &xml).await?;
        if job.wps_id != job.id {
            self.write_file(&self.xml_path(job.wps_id), &xml).await?;
        }

        self.last_xml_write.lock().unwrap().insert(job.id, Instant::now());
        Ok(())
    }

    /// Appends every log line in `lines` to `<job_id>.log` (and its `wps_id`
    /// alias), pre-formatted via `LogLine::render`.
    pub async fn append_logs(&self, job: &Job, lines: &[LogLine]) -> Result<(), StatusError> {
        if lines.is_empty() {
            return Ok(());
        }
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| StatusError::Io { path: self.output_dir.display().to_string(), detail: e.to_string() })?;

        let rendered: String = lines.iter().map(|l| l.render() + "\n").collect();
        self.append_file(&self.log_path(job.id), &rendered).await?;
        if job.wps_id != job.id {
            self.append_file(&self.log_path(job.wps_id), &rendered).await?;
        }
        Ok(())
    }

    fn should_write(&self, id: Uuid) -> bool {
        let guard = self.last_xml_write.lock().unwrap();
        match guard.get(&id) {
            Some(last) => last.elapsed() >= XML_WRITE_THROTTLE,
            None => true,
        }
    }

    async fn write_file(&self, path: &Path, content: &str) -> Result<(), StatusError> {
        tokio::fs::write(path, content)
            .await
            .map_err(|e| StatusError::Io { path: path.display().to_string(), detail: e.to_string() })
    }

    async fn append_file(&self, path: &Path, content: &str) -> Result<(), StatusError> {
        use tokio::io::AsyncWriteExt;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| StatusError::Io { path: path.display().to_string(), detail: e.to_string() })?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| StatusError::Io { path: path.display().to_string(), detail: e.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weaver_contracts::job::JobStatus;

    #[tokio::test]
    async fn write_status_creates_xml_for_job_and_wps_id_alias() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = StatusBridge::new(dir.path().to_path_buf(), "http://x/wpsoutputs".to_string());
        let mut job = Job::new("echo", true, false);
        job.wps_id = Uuid::new_v4();

        bridge.write_status(&job).await.unwrap();

        assert!(dir.path().join(format!("{}.xml", job.id)).exists());
        assert!(dir.path().join(format!("{}.xml", job.wps_id)).exists());
    }

    #[tokio::test]
    async fn throttle_suppresses_rapid_non_terminal_rewrites() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = StatusBridge::new(dir.path().to_path_buf(), "http://x/wpsoutputs".to_string());
        let mut job = Job::new("echo", true, false);
        job.transition(JobStatus::Running).unwrap();

        bridge.write_status(&job).await.unwrap();
        let first_write = tokio::fs::read_to_string(dir.path().join(format!("{}.xml", job.id))).await.unwrap();

        job.set_progress(10);
        bridge.write_status(&job).await.unwrap();
        let second_write = tokio::fs::read_to_string(dir.path().join(format!("{}.xml", job.id))).await.unwrap();

        assert_eq!(first_write, second_write);
    }

    #[tokio::test]
    async fn terminal_transition_bypasses_the_throttle() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = StatusBridge::new(dir.path().to_path_buf(), "http://x/wpsoutputs".to_string());
        let mut job = Job::new("echo", true, false);
        job.transition(JobStatus::Running).unwrap();
        bridge.write_status(&job).await.unwrap();

        job.transition(JobStatus::Succeeded).unwrap();
        bridge.write_status(&job).await.unwrap();

        let content = tokio::fs::read_to_string(dir.path().join(format!("{}.xml", job.id))).await.unwrap();
        assert!(content.contains("ProcessSucceeded"));
    }

    #[tokio::test]
    async fn append_logs_writes_rendered_lines() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = StatusBridge::new(dir.path().to_path_buf(), "http://x/wpsoutputs".to_string());
        let job = Job::new("echo", true, false);
        let lines = vec![LogLine::new("INFO", "engine", "starting step 1")];

        bridge.append_logs(&job, &lines).await.unwrap();

        let content = tokio::fs::read_to_string(dir.path().join(format!("{}.log", job.id))).await.unwrap();
        assert!(content.contains("starting step 1"));
    }
}
