//! Job handler trait and the progress channel handed to it.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use pipeline_core::{Job, JobError, JobId, ProcessingResult, RepositoryReference, Stage};
use ractor::ActorRef;
use ractor::rpc::CallResult;

use crate::messages::QueueMessage;

/// Result type for job handlers.
pub type HandlerResult = Result<ProcessingResult, JobError>;

/// Future type for async job handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

const REPORT_TIMEOUT: Duration = Duration::from_secs(5);

/// Trait for job handlers.
///
/// A worker calls `handle` once per admitted job. Errors are recorded on the
/// job as its failure; they never reach the worker loop.
pub trait JobHandler: Send + Sync + 'static {
    /// Process a job and return the result.
    fn handle(&self, job: &Job, progress: ProgressReporter) -> HandlerFuture;
}

/// Lets a running handler record milestones on its own job.
#[derive(Clone)]
pub struct ProgressReporter {
    job_id: JobId,
    queue: ActorRef<QueueMessage>,
}

impl ProgressReporter {
    pub(crate) fn new(job_id: JobId, queue: ActorRef<QueueMessage>) -> Self {
        Self { job_id, queue }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Record `stage`. Returns `false` when the tracker ignored it, either
    /// because progress would go backwards or the tracker is gone.
    pub async fn report(&self, stage: Stage) -> bool {
        let result = ractor::rpc::call(
            &self.queue,
            |reply| QueueMessage::ReportProgress {
                job_id: self.job_id,
                stage,
                reply,
            },
            Some(REPORT_TIMEOUT),
        )
        .await;

        match result {
            Ok(CallResult::Success(accepted)) => accepted,
            _ => {
                tracing::debug!("Progress report for job {} not delivered", self.job_id);
                false
            }
        }
    }

    /// Attach the validated repository reference to the job.
    pub fn attach_reference(&self, reference: RepositoryReference) {
        if let Err(e) = self.queue.send_message(QueueMessage::AttachReference {
            job_id: self.job_id,
            reference,
        }) {
            tracing::debug!("Reference for job {} not delivered: {}", self.job_id, e);
        }
    }
}

/// A simple function-based job handler.
pub struct FnHandler<F>
where
    F: Fn(&Job, ProgressReporter) -> HandlerFuture + Send + Sync + 'static,
{
    handler: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&Job, ProgressReporter) -> HandlerFuture + Send + Sync + 'static,
{
    /// Create a new function-based handler.
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F> JobHandler for FnHandler<F>
where
    F: Fn(&Job, ProgressReporter) -> HandlerFuture + Send + Sync + 'static,
{
    fn handle(&self, job: &Job, progress: ProgressReporter) -> HandlerFuture {
        (self.handler)(job, progress)
    }
}
