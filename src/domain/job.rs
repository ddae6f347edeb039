use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(u64);

impl JobId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Created,
    Active,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub state: JobState,
    pub attempts: u32,
    pub failed_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(id: JobId, job_type: &str, payload: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id,
            job_type: job_type.to_string(),
            payload,
            state: JobState::Created,
            attempts: 0,
            failed_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// `created -> active`, counting the attempt.
    pub fn activate(&mut self) {
        self.state = JobState::Active;
        self.attempts += 1;
        self.updated_at = Utc::now();
    }

    /// `active -> created`, used when a timed out or interrupted job is requeued.
    pub fn requeue(&mut self) {
        self.state = JobState::Created;
        self.updated_at = Utc::now();
    }

    pub fn finish(&mut self, outcome: &JobOutcome) {
        match outcome {
            JobOutcome::Completed => {
                self.state = JobState::Completed;
                self.failed_reason = None;
            }
            JobOutcome::Failed { reason } => {
                self.state = JobState::Failed;
                self.failed_reason = Some(reason.clone());
            }
        }
        self.updated_at = Utc::now();
    }
}

/// Terminal result of processing a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed { reason: String },
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Lifecycle notifications broadcast by the job queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobEvent {
    Enqueued { id: JobId, job_type: String },
    Started { id: JobId, attempt: u32 },
    Requeued { id: JobId, attempts: u32 },
    Completed { id: JobId },
    Failed { id: JobId, reason: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobCounts {
    pub created: usize,
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
}
