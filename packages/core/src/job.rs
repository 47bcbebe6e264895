//! Job domain types for repository processing requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::{JobError, ProcessingResult, RepositoryReference};

/// Unique identifier for a job, using ULID for chronological sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Ulid);

impl JobId {
    /// Create a new unique job ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a job ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the user who submitted a job, as supplied by the auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Coarse milestones reported by the orchestrator while a job runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Waiting in the queue.
    #[default]
    Queued,
    /// Admitted; validation under way.
    Admitted,
    Validated,
    Extracted,
    Formatted,
    /// Terminal outcome recorded.
    Finished,
}

impl Stage {
    /// Progress percentage the milestone stands for.
    pub fn progress(&self) -> u8 {
        match self {
            Stage::Queued => 0,
            Stage::Admitted => 5,
            Stage::Validated => 35,
            Stage::Extracted => 75,
            Stage::Formatted => 95,
            Stage::Finished => 100,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Queued => "queued",
            Stage::Admitted => "admitted",
            Stage::Validated => "validated",
            Stage::Extracted => "extracted",
            Stage::Formatted => "formatted",
            Stage::Finished => "finished",
        }
    }
}

/// Current status of a job in its lifecycle.
///
/// The only legal path is `Queued -> Processing -> {Completed | Failed}`.
/// The terminal variants carry their outcome, so a job can never expose a
/// result and an error at the same time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is waiting for a free concurrency slot.
    #[default]
    Queued,
    /// Job was admitted and is running through the pipeline.
    Processing {
        started_at: DateTime<Utc>,
        worker_id: String,
    },
    /// Job produced a document.
    Completed {
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        result: Box<ProcessingResult>,
    },
    /// A stage failed.
    Failed {
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
        error: JobError,
    },
}

impl JobStatus {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed { .. } | JobStatus::Failed { .. })
    }

    /// Get a simple status string for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing { .. } => "processing",
            JobStatus::Completed { .. } => "completed",
            JobStatus::Failed { .. } => "failed",
        }
    }

    /// When the job was admitted, if it has been.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        match self {
            JobStatus::Queued => None,
            JobStatus::Processing { started_at, .. }
            | JobStatus::Completed { started_at, .. }
            | JobStatus::Failed { started_at, .. } => Some(*started_at),
        }
    }
}

/// A job represents one repository-processing request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier for this job.
    pub id: JobId,
    /// Submitting user; callers compare it against the authenticated identity.
    pub user_id: UserId,
    /// Repository URL exactly as submitted.
    pub source_url: String,
    /// Set once validation succeeds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<RepositoryReference>,
    /// Current status.
    pub status: JobStatus,
    /// 0-100, never decreasing while processing.
    pub progress: u8,
    /// Last milestone reached.
    pub stage: Stage,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the job was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new queued job.
    pub fn new(user_id: UserId, source_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            user_id,
            source_url: source_url.into(),
            reference: None,
            status: JobStatus::Queued,
            progress: 0,
            stage: Stage::Queued,
            created_at: now,
            updated_at: now,
        }
    }

    /// The document, if the job completed.
    pub fn result(&self) -> Option<&ProcessingResult> {
        match &self.status {
            JobStatus::Completed { result, .. } => Some(result),
            _ => None,
        }
    }

    /// The failure, if the job failed.
    pub fn error(&self) -> Option<&JobError> {
        match &self.status {
            JobStatus::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }
}
