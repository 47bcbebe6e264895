//! Owned handle to a running queue actor and its worker pool.

use std::sync::Arc;
use std::time::Duration;

use pipeline_core::{Job, JobEvent, JobId, QueueConfig, QueuePosition, QueueStats, Stage, UserId};
use ractor::{Actor, ActorRef, RpcReplyPort};
use tokio::sync::broadcast;

use crate::error::TrackerError;
use crate::handler::JobHandler;
use crate::messages::{QueueMessage, WorkerMessage};
use crate::queue_actor::{QueueActor, QueueActorState};
use crate::worker_actor::{WorkerActor, WorkerArgs};

const EVENT_CAPACITY: usize = 1024;

/// Cloneable handle to the job tracker.
///
/// Every call is a message to the queue actor; the handle holds no state of
/// its own beyond the actor references.
#[derive(Clone)]
pub struct JobTracker {
    queue: ActorRef<QueueMessage>,
    workers: Arc<Vec<ActorRef<WorkerMessage>>>,
    event_tx: broadcast::Sender<JobEvent>,
    config: QueueConfig,
}

/// Spawn the queue actor and `config.concurrency` workers running `handler`.
pub async fn start_tracker(
    config: QueueConfig,
    handler: Arc<dyn JobHandler>,
) -> Result<JobTracker, TrackerError> {
    let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

    let state = QueueActorState::new(config.clone(), event_tx.clone());
    let (queue, _handle) = Actor::spawn(None, QueueActor, state)
        .await
        .map_err(|e| TrackerError::Unavailable(format!("failed to spawn queue: {}", e)))?;

    let mut workers = Vec::with_capacity(config.concurrency as usize);
    for n in 1..=config.concurrency.max(1) {
        let args = WorkerArgs {
            worker_id: format!("worker-{}", n),
            queue: queue.clone(),
            handler: handler.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
        };
        let (worker, _handle) = Actor::spawn(None, WorkerActor, args)
            .await
            .map_err(|e| TrackerError::Unavailable(format!("failed to spawn worker: {}", e)))?;
        workers.push(worker);
    }

    tracing::info!("Job tracker started with {} workers", workers.len());

    Ok(JobTracker {
        queue,
        workers: Arc::new(workers),
        event_tx,
        config,
    })
}

impl JobTracker {
    async fn call<T>(
        &self,
        build: impl FnOnce(RpcReplyPort<T>) -> QueueMessage,
    ) -> Result<T, TrackerError>
    where
        T: Send + 'static,
    {
        let (tx, rx) = ractor::concurrency::oneshot();
        self.queue
            .send_message(build(tx.into()))
            .map_err(|e| TrackerError::Unavailable(format!("failed to send message: {}", e)))?;
        rx.await
            .map_err(|_| TrackerError::Unavailable("no reply from queue".into()))
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Create a queued job for `source_url` and return it immediately.
    pub async fn submit(
        &self,
        user_id: UserId,
        source_url: impl Into<String>,
    ) -> Result<Job, TrackerError> {
        let job = Job::new(user_id, source_url);
        self.call(|reply| QueueMessage::Submit {
            job: Box::new(job),
            reply,
        })
        .await?
    }

    /// Snapshot of a job; `None` for unknown ids.
    pub async fn get_status(&self, job_id: JobId) -> Result<Option<Job>, TrackerError> {
        self.call(|reply| QueueMessage::GetJob { job_id, reply }).await
    }

    /// Place of a job in the wait sequence; `None` for unknown ids.
    pub async fn get_queue_status(
        &self,
        job_id: JobId,
    ) -> Result<Option<QueuePosition>, TrackerError> {
        self.call(|reply| QueueMessage::GetPosition { job_id, reply })
            .await
    }

    /// Record a milestone; `false` when ignored.
    pub async fn report_progress(&self, job_id: JobId, stage: Stage) -> Result<bool, TrackerError> {
        self.call(|reply| QueueMessage::ReportProgress {
            job_id,
            stage,
            reply,
        })
        .await
    }

    /// Jobs, newest first, optionally for a single user.
    pub async fn list_jobs(
        &self,
        user_id: Option<UserId>,
        limit: usize,
    ) -> Result<Vec<Job>, TrackerError> {
        self.call(|reply| QueueMessage::ListJobs {
            user_id,
            limit,
            reply,
        })
        .await
    }

    pub async fn stats(&self) -> Result<QueueStats, TrackerError> {
        self.call(|reply| QueueMessage::GetStats { reply }).await
    }

    /// Receive lifecycle events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.event_tx.subscribe()
    }

    /// Stop the workers and the queue actor. Jobs in flight finish first; a
    /// job admitted but not yet started by its worker is failed as internal.
    pub fn shutdown(&self) {
        for worker in self.workers.iter() {
            let _ = worker.send_message(WorkerMessage::Shutdown);
        }
        let _ = self.queue.send_message(QueueMessage::Shutdown);
    }
}
