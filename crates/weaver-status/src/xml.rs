use quick_xml::escape::escape;
use weaver_contracts::job::{Job, JobStatus};

use crate::error::StatusError;

/// Renders the legacy WPS 1.0/2.0 `ExecuteResponse` status document for
/// `job`. `ProcessStarted` carries `percentCompleted`; `ProcessPaused` is
/// never produced here (decode-compatibility only, see `parse_status_xml`).
pub fn render_execute_response(job: &Job, status_location: &str) -> Result<String, StatusError> {
    let status_element = match job.status {
        JobStatus::Accepted => "<ProcessAccepted>job accepted</ProcessAccepted>".to_string(),
        JobStatus::Running => format!(
            "<ProcessStarted percentCompleted=\"{}\">{}</ProcessStarted>",
            job.progress,
            escape(job.status_message.as_deref().unwrap_or("job running"))
        ),
        JobStatus::Succeeded => "<ProcessSucceeded>job succeeded</ProcessSucceeded>".to_string(),
        JobStatus::Failed | JobStatus::Exception => {
            let text = job
                .exceptions
                .last()
                .map(|e| e.text.clone())
                .or_else(|| job.status_message.clone())
                .unwrap_or_else(|| "job failed".to_string());
            format!(
                "<ProcessFailed><ExceptionReport><Exception><ExceptionText>{}</ExceptionText></Exception></ExceptionReport></ProcessFailed>",
                escape(&text)
            )
        }
        JobStatus::Dismissed => "<ProcessFailed><ExceptionReport><Exception><ExceptionText>job dismissed</ExceptionText></Exception></ExceptionReport></ProcessFailed>".to_string(),
        JobStatus::Unknown => {
            return Err(StatusError::Render { what: "ExecuteResponse".to_string(), detail: "job status is unknown".to_string() })
        }
    };

    Ok(format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
<wps:ExecuteResponse xmlns:wps=\"http://www.opengis.net/wps/1.0.0\" statusLocation=\"{}\">\
<wps:Status>{}</wps:Status></wps:ExecuteResponse>",
        escape(status_location),
        status_element
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_job_carries_percent_completed() {
        let mut job = Job::new("echo", true, false);
        job.transition(JobStatus::Running).unwrap();
        job.set_progress(42);
        let xml = render_execute_response(&job, "http://x/1.xml").unwrap();
        assert!(xml.contains("percentCompleted=\"42\""));
        assert!(xml.contains("ProcessStarted"));
    }

    #[test]
    fn succeeded_job_renders_process_succeeded() {
        let mut job = Job::new("echo", true, false);
        job.transition(JobStatus::Running).unwrap();
        job.transition(JobStatus::Succeeded).unwrap();
        let xml = render_execute_response(&job, "http://x/1.xml").unwrap();
        assert!(xml.contains("ProcessSucceeded"));
    }

    #[test]
    fn failed_job_renders_exception_text() {
        use weaver_contracts::job::Exception;
        let mut job = Job::new("echo", true, false);
        job.transition(JobStatus::Running).unwrap();
        job.exceptions.push(Exception { code: "E".to_string(), locator: None, text: "boom".to_string() });
        job.transition(JobStatus::Failed).unwrap();
        let xml = render_execute_response(&job, "http://x/1.xml").unwrap();
        assert!(xml.contains("boom"));
        assert!(xml.contains("ProcessFailed"));
    }
}
