//! Job tracking for external generation requests
//!
//! A job lives only as long as one orchestration call. Its status is
//! advanced by the poller and frozen once it reaches a terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a generation job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "QUEUED"),
            JobStatus::Processing => write!(f, "PROCESSING"),
            JobStatus::Completed => write!(f, "COMPLETED"),
            JobStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Parameters sent to the provider at submit time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default)]
    pub instrumental: bool,
    /// Requested duration in seconds
    #[serde(default)]
    pub duration: Option<f64>,
    /// Provider model identifier
    pub model: String,
}

/// One in-flight or completed generation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaJob {
    /// Local, process-unique job id
    pub id: String,
    /// Provider-assigned task id, known once submit succeeds
    #[serde(default)]
    pub task_id: Option<String>,
    status: JobStatus,
    pub request: GenerationRequest,
    pub created_at: DateTime<Utc>,
}

impl MediaJob {
    /// Create a queued job
    pub fn new(request: GenerationRequest) -> Self {
        Self {
            id: ember_core::job_id(),
            task_id: None,
            status: JobStatus::Queued,
            request,
            created_at: ember_core::now_utc(),
        }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Move to `next`. Returns `false` and leaves the job untouched if it is
    /// already terminal.
    pub fn advance(&mut self, next: JobStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest {
            prompt: "Lo-fi café ambience".to_string(),
            instrumental: true,
            duration: Some(30.0),
            model: "V4".to_string(),
        }
    }

    #[test]
    fn test_job_creation() {
        let job = MediaJob::new(request());
        assert_eq!(job.status(), JobStatus::Queued);
        assert!(job.task_id.is_none());
        assert!(!job.id.is_empty());
    }

    #[test]
    fn test_job_ids_are_unique() {
        assert_ne!(MediaJob::new(request()).id, MediaJob::new(request()).id);
    }

    #[test]
    fn test_terminal_status_is_frozen() {
        let mut job = MediaJob::new(request());
        assert!(job.advance(JobStatus::Processing));
        assert!(job.advance(JobStatus::Completed));

        assert!(!job.advance(JobStatus::Processing));
        assert!(!job.advance(JobStatus::Failed));
        assert_eq!(job.status(), JobStatus::Completed);
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let json = serde_json::to_string(&JobStatus::Processing).unwrap();
        assert_eq!(json, "\"PROCESSING\"");
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
    }
}
