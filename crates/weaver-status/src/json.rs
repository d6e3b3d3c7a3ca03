use serde::Serialize;
use utoipa::ToSchema;
use weaver_contracts::job::{Job, JobStatus};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Link {
    pub rel: String,
    pub href: String,
}

/// The OGC API — Processes JSON job status document.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusDocument {
    #[serde(rename = "jobID")]
    pub job_id: String,
    pub status: String,
    pub message: Option<String>,
    pub progress: u8,
    pub created: String,
    pub started: Option<String>,
    pub finished: Option<String>,
    pub links: Vec<Link>,
}

/// Builds the JSON status document for `job`, whose `self_url` and
/// `base_url` anchor its `links` entries. `links` always carries `self` and
/// `logs`; `results` is added once the job succeeds, `exceptions` once it
/// fails or raises an exception.
pub fn build_status_document(job: &Job, self_url: &str, base_url: &str) -> StatusDocument {
    let mut links = vec![
        Link { rel: "self".to_string(), href: self_url.to_string() },
        Link { rel: "logs".to_string(), href: format!("{base_url}/logs") },
    ];

    match job.status {
        JobStatus::Succeeded => links.push(Link { rel: "results".to_string(), href: format!("{base_url}/results") }),
        JobStatus::Failed | JobStatus::Exception => {
            links.push(Link { rel: "exceptions".to_string(), href: format!("{base_url}/exceptions") })
        }
        _ => {}
    }

    StatusDocument {
        job_id: job.id.to_string(),
        status: job.status.to_string(),
        message: job.status_message.clone(),
        progress: job.progress,
        created: job.created.to_rfc3339(),
        started: (job.status != JobStatus::Accepted).then(|| job.created.to_rfc3339()),
        finished: job.finished.map(|f| f.to_rfc3339()),
        links,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weaver_contracts::job::Job;

    #[test]
    fn accepted_job_links_carry_only_self_and_logs() {
        let job = Job::new("echo", true, false);
        let doc = build_status_document(&job, "http://x/jobs/1", "http://x/jobs/1");
        assert_eq!(doc.links.len(), 2);
        assert!(doc.started.is_none());
    }

    #[test]
    fn succeeded_job_links_include_results() {
        let mut job = Job::new("echo", true, false);
        job.transition(JobStatus::Running).unwrap();
        job.transition(JobStatus::Succeeded).unwrap();
        let doc = build_status_document(&job, "http://x/jobs/1", "http://x/jobs/1");
        assert!(doc.links.iter().any(|l| l.rel == "results"));
        assert_eq!(doc.progress, 100);
    }

    #[test]
    fn failed_job_links_include_exceptions() {
        let mut job = Job::new("echo", true, false);
        job.transition(JobStatus::Running).unwrap();
        job.transition(JobStatus::Failed).unwrap();
        let doc = build_status_document(&job, "http://x/jobs/1", "http://x/jobs/1");
        assert!(doc.links.iter().any(|l| l.rel == "exceptions"));
    }
}
