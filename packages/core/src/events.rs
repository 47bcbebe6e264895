//! Event types for push-style job updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ErrorKind, JobId, Stage, UserId};

/// Events emitted by the tracker as jobs move through their lifecycle.
///
/// Polling `get_status` is the primary contract; these events are for
/// clients that prefer to be notified.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    /// A job entered the wait sequence.
    JobSubmitted {
        job_id: JobId,
        user_id: UserId,
        position: usize,
        timestamp: DateTime<Utc>,
    },
    /// A job was admitted to a worker.
    JobStarted {
        job_id: JobId,
        worker_id: String,
        timestamp: DateTime<Utc>,
    },
    /// A job reached a new milestone.
    JobProgress {
        job_id: JobId,
        stage: Stage,
        progress: u8,
        timestamp: DateTime<Utc>,
    },
    /// A job produced its document.
    JobCompleted {
        job_id: JobId,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// A job failed.
    JobFailed {
        job_id: JobId,
        kind: ErrorKind,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl JobEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            JobEvent::JobSubmitted { timestamp, .. } => *timestamp,
            JobEvent::JobStarted { timestamp, .. } => *timestamp,
            JobEvent::JobProgress { timestamp, .. } => *timestamp,
            JobEvent::JobCompleted { timestamp, .. } => *timestamp,
            JobEvent::JobFailed { timestamp, .. } => *timestamp,
        }
    }

    /// Get the job ID this event is about.
    pub fn job_id(&self) -> JobId {
        match self {
            JobEvent::JobSubmitted { job_id, .. } => *job_id,
            JobEvent::JobStarted { job_id, .. } => *job_id,
            JobEvent::JobProgress { job_id, .. } => *job_id,
            JobEvent::JobCompleted { job_id, .. } => *job_id,
            JobEvent::JobFailed { job_id, .. } => *job_id,
        }
    }

    /// Whether this event closes the job's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobEvent::JobCompleted { .. } | JobEvent::JobFailed { .. }
        )
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            JobEvent::JobSubmitted {
                job_id, position, ..
            } => format!("Job {} queued at position {}", job_id, position),
            JobEvent::JobStarted {
                job_id, worker_id, ..
            } => format!("Job {} started by {}", job_id, worker_id),
            JobEvent::JobProgress {
                job_id,
                stage,
                progress,
                ..
            } => format!("Job {} {} ({}%)", job_id, stage.as_str(), progress),
            JobEvent::JobCompleted {
                job_id,
                duration_ms,
                ..
            } => format!("Job {} completed in {}ms", job_id, duration_ms),
            JobEvent::JobFailed {
                job_id,
                kind,
                message,
                ..
            } => format!("Job {} failed ({}): {}", job_id, kind, message),
        }
    }
}
