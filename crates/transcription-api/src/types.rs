//! Data types for the transcription API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ttl_cache::CacheStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "positive" => Some(Self::Positive),
            "neutral" => Some(Self::Neutral),
            "negative" => Some(Self::Negative),
            _ => None,
        }
    }
}

/// Categorization of a transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub primary_topic: String,
    pub sentiment: Sentiment,
    pub keywords: Vec<String>,
    pub confidence: f64,
    pub summary: String,
}

/// LLM provider a user prefers for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmProvider::OpenAi => write!(f, "openai"),
            LlmProvider::Anthropic => write!(f, "anthropic"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

/// A unit of submitted work and its progress.
///
/// The transition methods never leave a terminal state and never move
/// `progress` backwards.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub user_id: String,
    pub status: JobStatus,
    pub progress: f64,
    pub transcription: Option<String>,
    pub category: Option<Category>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: String, user_id: String) -> Self {
        Self {
            id,
            user_id,
            status: JobStatus::Queued,
            progress: 0.0,
            transcription: None,
            category: None,
            error: None,
            created_at: Utc::now(),
        }
    }

    /// Picked up by a worker
    pub fn start(&mut self) {
        if self.status == JobStatus::Queued {
            self.status = JobStatus::Processing;
            self.advance(0.1);
        }
    }

    pub fn advance(&mut self, progress: f64) {
        if !self.status.is_terminal() {
            self.progress = self.progress.max(progress.clamp(0.0, 1.0));
        }
    }

    pub fn complete(&mut self) {
        if !self.status.is_terminal() {
            self.status = JobStatus::Completed;
            self.progress = 1.0;
        }
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        if !self.status.is_terminal() {
            self.status = JobStatus::Error;
            self.error = Some(message.into());
        }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.id.clone(),
            status: self.status,
            progress: self.progress,
            transcription: self.transcription.clone(),
            category: self.category.clone(),
            error: self.error.clone(),
        }
    }
}

/// Read-only view of a job as reported to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: f64,
    pub transcription: Option<String>,
    pub category: Option<Category>,
    pub error: Option<String>,
}

/// Result of submitting a job
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedJob {
    pub job_id: String,
    pub user_id: String,
    pub status: JobStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    pub transcription_cache: CacheStats,
    pub category_cache: CacheStats,
    pub user_preference_cache: CacheStats,
    /// Every job held by the job store
    pub active_jobs: usize,
    /// Jobs submitted but not yet in a terminal state
    pub in_flight_jobs: usize,
    pub users: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub version: String,
    pub detail: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub version: String,
    pub user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptionJobResponse {
    pub version: String,
    pub job_id: String,
    pub status: JobStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscriptionStatusResponse {
    pub version: String,
    #[serde(flatten)]
    pub job: JobSnapshot,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClearCacheResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new("job-1".to_string(), "user-1".to_string())
    }

    #[test]
    fn test_new_job_is_queued() {
        let job = job();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, 0.0);
        assert!(job.transcription.is_none());
        assert!(job.error.is_none());
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut job = job();
        job.start();
        job.advance(0.5);
        job.advance(0.3);
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.progress, 0.5);
    }

    #[test]
    fn test_complete_sets_full_progress() {
        let mut job = job();
        job.start();
        job.complete();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 1.0);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut job = job();
        job.start();
        job.advance(0.3);
        job.fail("boom");
        job.complete();
        job.advance(0.9);
        job.start();

        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.progress, 0.3);
        assert_eq!(job.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_enum_serialization() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Completed).unwrap(),
            "\"completed\""
        );
        assert_eq!(
            serde_json::to_string(&LlmProvider::OpenAi).unwrap(),
            "\"openai\""
        );
        assert_eq!(LlmProvider::Anthropic.to_string(), "anthropic");
        assert_eq!(Sentiment::parse("neutral"), Some(Sentiment::Neutral));
        assert_eq!(Sentiment::parse("angry"), None);
    }

    #[test]
    fn test_status_response_is_flat() {
        let mut job = job();
        job.start();
        let response = TranscriptionStatusResponse {
            version: "1.0.0".to_string(),
            job: job.snapshot(),
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["version"], "1.0.0");
        assert_eq!(json["job_id"], "job-1");
        assert_eq!(json["status"], "processing");
        assert!(json["category"].is_null());
    }
}
