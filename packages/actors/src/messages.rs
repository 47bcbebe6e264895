//! Message types for actor communication.

use pipeline_core::{
    Job, JobError, JobId, ProcessingResult, QueuePosition, QueueStats, RepositoryReference, Stage,
    UserId,
};
use ractor::RpcReplyPort;

use crate::error::TrackerError;

/// Messages for the QueueActor.
#[derive(Debug)]
pub enum QueueMessage {
    /// Append a new job to the wait sequence.
    Submit {
        job: Box<Job>,
        reply: RpcReplyPort<Result<Job, TrackerError>>,
    },

    /// Request the next admitted job for a worker.
    RequestJob {
        worker_id: String,
        reply: RpcReplyPort<Option<Job>>,
    },

    /// Record a milestone; answers whether progress was accepted.
    ReportProgress {
        job_id: JobId,
        stage: Stage,
        reply: RpcReplyPort<bool>,
    },

    /// Attach the validated repository reference.
    AttachReference {
        job_id: JobId,
        reference: RepositoryReference,
    },

    /// Report job completion.
    JobCompleted {
        job_id: JobId,
        worker_id: String,
        result: Box<ProcessingResult>,
    },

    /// Report job failure.
    JobFailed {
        job_id: JobId,
        worker_id: String,
        error: JobError,
    },

    /// Get a job by ID.
    GetJob {
        job_id: JobId,
        reply: RpcReplyPort<Option<Job>>,
    },

    /// Get a job's place in the wait sequence.
    GetPosition {
        job_id: JobId,
        reply: RpcReplyPort<Option<QueuePosition>>,
    },

    /// List jobs, newest first.
    ListJobs {
        user_id: Option<UserId>,
        limit: usize,
        reply: RpcReplyPort<Vec<Job>>,
    },

    /// Get queue stats.
    GetStats { reply: RpcReplyPort<QueueStats> },

    /// Stop the tracker.
    Shutdown,
}

/// Messages for the WorkerActor.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Run an admitted job to its outcome.
    ProcessJob { job: Box<Job> },

    /// Ask the queue for work.
    Heartbeat,

    /// Shutdown the worker.
    Shutdown,
}
