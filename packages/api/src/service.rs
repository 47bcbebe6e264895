//! Inbound surface for the rest of the application.
//!
//! The tracker knows nothing about users beyond recording the submitter;
//! every read here checks the requester against it.

use std::collections::HashSet;
use std::str::FromStr;

use actors::{JobTracker, TrackerError};
use pipeline_core::{ErrorKind, Job, JobEvent, JobId, JobStatus, ProcessingResult, QueuePosition, QueueStats, UserId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::processor::format_for_llm;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("job {0} not found")]
    JobNotFound(JobId),

    #[error("job {0} belongs to another user")]
    AccessDenied(JobId),

    #[error("job {job_id} is {status}, no result available")]
    InvalidState { job_id: JobId, status: &'static str },

    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::JobNotFound(_) => ErrorKind::JobNotFound,
            ServiceError::AccessDenied(_) => ErrorKind::AccessDenied,
            ServiceError::InvalidState { .. } => ErrorKind::InvalidState,
            ServiceError::Tracker(e) => e.kind(),
        }
    }
}

/// Shape of a result export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultFormat {
    /// Structured result with metadata.
    #[default]
    Json,
    /// The plain document text.
    Llm,
}

impl FromStr for ResultFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ResultFormat::Json),
            "llm" | "text" => Ok(ResultFormat::Llm),
            other => Err(format!("unknown result format '{}'", other)),
        }
    }
}

/// A completed job's result in the requested shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutput {
    Json(Box<ProcessingResult>),
    Llm(String),
}

/// Submission and owner-checked lookups over a [`JobTracker`].
#[derive(Clone)]
pub struct PipelineService {
    tracker: JobTracker,
}

impl PipelineService {
    pub fn new(tracker: JobTracker) -> Self {
        Self { tracker }
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    /// Queue `url` for `user_id`. The URL is checked when the job runs, so
    /// a malformed URL yields a failed job rather than an error here.
    pub async fn submit(&self, user_id: UserId, url: &str) -> Result<JobId, ServiceError> {
        let job = self.tracker.submit(user_id, url.trim()).await?;
        Ok(job.id)
    }

    /// The job, if it exists; `AccessDenied` if it is someone else's.
    pub async fn get_status(
        &self,
        job_id: JobId,
        requester: &UserId,
    ) -> Result<Option<Job>, ServiceError> {
        match self.tracker.get_status(job_id).await? {
            Some(job) if !job.is_owned_by(requester) => Err(ServiceError::AccessDenied(job_id)),
            other => Ok(other),
        }
    }

    pub async fn get_queue_status(
        &self,
        job_id: JobId,
        requester: &UserId,
    ) -> Result<Option<QueuePosition>, ServiceError> {
        if self.get_status(job_id, requester).await?.is_none() {
            return Ok(None);
        }
        Ok(self.tracker.get_queue_status(job_id).await?)
    }

    /// Result of a completed job in `format`.
    pub async fn get_result(
        &self,
        job_id: JobId,
        requester: &UserId,
        format: ResultFormat,
    ) -> Result<JobOutput, ServiceError> {
        let job = self
            .get_status(job_id, requester)
            .await?
            .ok_or(ServiceError::JobNotFound(job_id))?;

        let status = job.status.as_str();
        let JobStatus::Completed { result, .. } = job.status else {
            return Err(ServiceError::InvalidState { job_id, status });
        };

        Ok(match format {
            ResultFormat::Json => JobOutput::Json(result),
            ResultFormat::Llm => JobOutput::Llm(format_for_llm(&result).to_string()),
        })
    }

    /// The requester's jobs, newest first.
    pub async fn list_jobs(&self, requester: &UserId, limit: usize) -> Result<Vec<Job>, ServiceError> {
        Ok(self.tracker.list_jobs(Some(requester.clone()), limit).await?)
    }

    pub async fn stats(&self) -> Result<QueueStats, ServiceError> {
        Ok(self.tracker.stats().await?)
    }

    /// Events for the requester's jobs only.
    pub fn subscribe(&self, requester: UserId) -> OwnedEvents {
        OwnedEvents {
            rx: self.tracker.subscribe(),
            owner: requester,
            owned: HashSet::new(),
        }
    }

    pub fn shutdown(&self) {
        self.tracker.shutdown();
    }
}

/// Event stream filtered to one user's jobs.
///
/// Ownership is learned from `JobSubmitted`, so jobs submitted before
/// subscribing are not followed.
pub struct OwnedEvents {
    rx: broadcast::Receiver<JobEvent>,
    owner: UserId,
    /// Live jobs of the owner; a job leaves once its terminal event passes.
    owned: HashSet<JobId>,
}

impl OwnedEvents {
    /// Next event for one of the owner's jobs; `None` once the tracker is gone.
    pub async fn recv(&mut self) -> Option<JobEvent> {
        loop {
            let event = match self.rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Event subscriber lagged, {} events skipped", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            };

            if let JobEvent::JobSubmitted { job_id, user_id, .. } = &event
                && *user_id == self.owner
            {
                self.owned.insert(*job_id);
            }
            let followed = if event.is_terminal() {
                self.owned.remove(&event.job_id())
            } else {
                self.owned.contains(&event.job_id())
            };
            if followed {
                return Some(event);
            }
        }
    }
}
