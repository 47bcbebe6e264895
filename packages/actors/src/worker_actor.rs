//! Worker actor for executing jobs.

use std::sync::Arc;
use std::time::Duration;

use pipeline_core::{Job, JobError, JobId};
use ractor::rpc::CallResult;
use ractor::{Actor, ActorProcessingErr, ActorRef};

use crate::handler::{JobHandler, ProgressReporter};
use crate::messages::{QueueMessage, WorkerMessage};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// State for the worker actor.
pub struct WorkerActorState {
    /// Unique worker ID.
    pub worker_id: String,
    /// Queue actor reference.
    pub queue: ActorRef<QueueMessage>,
    handler: Arc<dyn JobHandler>,
    poll_interval: Duration,
    /// Admitted job waiting in this worker's own mailbox.
    pending_job: Option<JobId>,
    /// Whether the worker should continue running.
    pub running: bool,
}

/// Worker actor arguments.
pub struct WorkerArgs {
    pub worker_id: String,
    pub queue: ActorRef<QueueMessage>,
    pub handler: Arc<dyn JobHandler>,
    pub poll_interval: Duration,
}

/// Worker actor that pulls admitted jobs from the queue and runs them.
///
/// After finishing a job the worker asks again right away; when nothing is
/// waiting it asks again after the poll interval.
pub struct WorkerActor;

impl WorkerActor {
    fn schedule_heartbeat(myself: &ActorRef<WorkerMessage>, delay: Duration) {
        let myself = myself.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = myself.send_message(WorkerMessage::Heartbeat);
        });
    }

    async fn run(state: &WorkerActorState, job: Job) -> Result<(), ActorProcessingErr> {
        let job_id = job.id;
        let reporter = ProgressReporter::new(job_id, state.queue.clone());
        let future = state.handler.handle(&job, reporter);

        // A panicking handler fails its job instead of taking the worker down.
        let message = match tokio::spawn(future).await {
            Ok(Ok(result)) => QueueMessage::JobCompleted {
                job_id,
                worker_id: state.worker_id.clone(),
                result: Box::new(result),
            },
            Ok(Err(error)) => QueueMessage::JobFailed {
                job_id,
                worker_id: state.worker_id.clone(),
                error,
            },
            Err(e) => {
                tracing::error!("Handler for job {} aborted: {}", job_id, e);
                QueueMessage::JobFailed {
                    job_id,
                    worker_id: state.worker_id.clone(),
                    error: JobError::internal(format!("job handler aborted: {}", e)),
                }
            }
        };

        state.queue.send_message(message)?;
        Ok(())
    }
}

impl Actor for WorkerActor {
    type Msg = WorkerMessage;
    type State = WorkerActorState;
    type Arguments = WorkerArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting worker: {}", args.worker_id);

        Ok(WorkerActorState {
            worker_id: args.worker_id,
            queue: args.queue,
            handler: args.handler,
            poll_interval: args.poll_interval,
            pending_job: None,
            running: true,
        })
    }

    async fn post_start(
        &self,
        myself: ActorRef<Self::Msg>,
        _state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        myself.send_message(WorkerMessage::Heartbeat)?;
        Ok(())
    }

    /// A stop can overtake a self-sent `ProcessJob`; fail the job it carried.
    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if let Some(job_id) = state.pending_job.take() {
            tracing::warn!("Worker {} stopped before running job {}", state.worker_id, job_id);
            let _ = state.queue.send_message(QueueMessage::JobFailed {
                job_id,
                worker_id: state.worker_id.clone(),
                error: JobError::internal("worker stopped before the job ran"),
            });
        }
        Ok(())
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::ProcessJob { job } => {
                state.pending_job = None;
                Self::run(state, *job).await?;
                if state.running {
                    myself.send_message(WorkerMessage::Heartbeat)?;
                }
            }

            WorkerMessage::Shutdown => {
                tracing::info!("Shutting down worker: {}", state.worker_id);
                state.running = false;
                myself.stop(None);
            }

            WorkerMessage::Heartbeat => {
                if !state.running {
                    return Ok(());
                }

                let result = ractor::rpc::call(
                    &state.queue,
                    |reply| QueueMessage::RequestJob {
                        worker_id: state.worker_id.clone(),
                        reply,
                    },
                    Some(REQUEST_TIMEOUT),
                )
                .await;

                match result {
                    Ok(CallResult::Success(Some(job))) => {
                        state.pending_job = Some(job.id);
                        myself.send_message(WorkerMessage::ProcessJob { job: Box::new(job) })?;
                    }
                    Ok(CallResult::Success(None)) | Ok(CallResult::Timeout) => {
                        Self::schedule_heartbeat(&myself, state.poll_interval);
                    }
                    Ok(CallResult::SenderError) | Err(_) => {
                        tracing::info!("Queue gone, stopping worker: {}", state.worker_id);
                        state.running = false;
                        myself.stop(None);
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_core::{ErrorKind, QueueConfig, UserId};
    use tokio::sync::broadcast;

    use crate::handler::{FnHandler, HandlerFuture};
    use crate::queue_actor::{QueueActor, QueueActorState};

    async fn get(queue: &ActorRef<QueueMessage>, job_id: JobId) -> Job {
        match ractor::rpc::call(queue, |reply| QueueMessage::GetJob { job_id, reply }, None).await {
            Ok(CallResult::Success(Some(job))) => job,
            _ => panic!("job {job_id} should be tracked"),
        }
    }

    #[tokio::test]
    async fn stop_ahead_of_admitted_job_fails_it() {
        let (tx, _) = broadcast::channel(16);
        let state = QueueActorState::new(QueueConfig::default().with_concurrency(1), tx);
        let (queue, queue_handle) = Actor::spawn(None, QueueActor, state).await.unwrap();

        let handler = FnHandler::new(|_job: &Job, _progress: ProgressReporter| -> HandlerFuture {
            Box::pin(async { Err(JobError::new(ErrorKind::NotFound, "ran")) })
        });
        let args = WorkerArgs {
            worker_id: "worker-1".into(),
            queue: queue.clone(),
            handler: Arc::new(handler),
            poll_interval: Duration::from_secs(3600),
        };
        let (worker, worker_handle) = Actor::spawn(None, WorkerActor, args).await.unwrap();

        // Let the first poll find nothing so the worker sits idle.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let job = Job::new(UserId::new("alice"), "https://github.com/acme/widgets");
        let job_id = job.id;
        let submitted = ractor::rpc::call(
            &queue,
            |reply| QueueMessage::Submit {
                job: Box::new(job),
                reply,
            },
            None,
        )
        .await
        .unwrap();
        assert!(matches!(submitted, CallResult::Success(Ok(_))));

        // The poll admits the job and queues ProcessJob behind the shutdown.
        worker.send_message(WorkerMessage::Heartbeat).unwrap();
        worker.send_message(WorkerMessage::Shutdown).unwrap();
        worker_handle.await.unwrap();

        let job = get(&queue, job_id).await;
        assert!(job.status.is_terminal());
        assert_eq!(job.error().map(|e| e.kind), Some(ErrorKind::Internal));

        queue.stop(None);
        queue_handle.await.unwrap();
    }
}
