//! Queue actor owning the job table and the wait sequence.
//!
//! Every mutation and every read is a message to this actor, so callers
//! always observe the last completed mutation.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use pipeline_core::{
    Job, JobError, JobEvent, JobId, JobStatus, ProcessingResult, QueueConfig, QueuePosition,
    QueueStats, RepositoryReference, Stage, UserId,
};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::sync::broadcast;

use crate::error::TrackerError;
use crate::messages::QueueMessage;

/// State for the queue actor.
pub struct QueueActorState {
    config: QueueConfig,
    /// Waiting job ids, strictly FIFO.
    pending: VecDeque<JobId>,
    /// Jobs currently processing.
    running: HashSet<JobId>,
    /// All jobs by ID, retained for the process lifetime.
    jobs: HashMap<JobId, Job>,
    stats: QueueStats,
    event_tx: broadcast::Sender<JobEvent>,
}

impl QueueActorState {
    /// Create a new queue actor state.
    pub fn new(config: QueueConfig, event_tx: broadcast::Sender<JobEvent>) -> Self {
        Self {
            config,
            pending: VecDeque::new(),
            running: HashSet::new(),
            jobs: HashMap::new(),
            stats: QueueStats::default(),
            event_tx,
        }
    }

    /// Broadcast an event. Having no subscribers is fine.
    fn broadcast(&self, event: JobEvent) {
        let _ = self.event_tx.send(event);
    }

    fn update_stats(&mut self) {
        self.stats.pending = self.pending.len() as u64;
        self.stats.running = self.running.len() as u64;
    }

    fn submit(&mut self, job: Job) -> Result<Job, TrackerError> {
        if let Some(capacity) = self.config.max_queue_size
            && self.pending.len() >= capacity
        {
            return Err(TrackerError::QueueFull { capacity });
        }

        let job_id = job.id;
        self.jobs.insert(job_id, job.clone());
        self.pending.push_back(job_id);

        tracing::info!(
            "Queued job {} for {} at position {}",
            job_id,
            job.user_id,
            self.pending.len()
        );
        self.broadcast(JobEvent::JobSubmitted {
            job_id,
            user_id: job.user_id.clone(),
            position: self.pending.len(),
            timestamp: job.created_at,
        });
        self.update_stats();
        Ok(job)
    }

    /// Admit the head of the wait sequence if a slot is free.
    fn admit(&mut self, worker_id: String) -> Option<Job> {
        if self.running.len() >= self.config.concurrency as usize {
            return None;
        }

        while let Some(job_id) = self.pending.pop_front() {
            let Some(job) = self.jobs.get_mut(&job_id) else {
                continue;
            };
            if !matches!(job.status, JobStatus::Queued) {
                tracing::warn!("Skipping job {} found in wait sequence as {}", job_id, job.status.as_str());
                continue;
            }

            let now = Utc::now();
            job.status = JobStatus::Processing {
                started_at: now,
                worker_id: worker_id.clone(),
            };
            job.stage = Stage::Admitted;
            job.progress = Stage::Admitted.progress();
            job.updated_at = now;
            let admitted = job.clone();

            self.running.insert(job_id);
            self.update_stats();
            return Some(admitted);
        }
        None
    }

    /// Announce a job whose admission reached its worker.
    fn started(&self, job: &Job) {
        let JobStatus::Processing {
            started_at,
            worker_id,
        } = &job.status
        else {
            return;
        };
        tracing::info!("Job {} admitted by {}", job.id, worker_id);
        self.broadcast(JobEvent::JobStarted {
            job_id: job.id,
            worker_id: worker_id.clone(),
            timestamp: *started_at,
        });
    }

    /// Undo an admission the worker never received: the job goes back to
    /// the head of the wait sequence as if it had never left.
    fn requeue(&mut self, job_id: JobId) {
        if !self.running.remove(&job_id) {
            return;
        }
        if let Some(job) = self.jobs.get_mut(&job_id) {
            job.status = JobStatus::Queued;
            job.stage = Stage::Queued;
            job.progress = Stage::Queued.progress();
            job.updated_at = Utc::now();
        }
        self.pending.push_front(job_id);
        tracing::warn!("Returned job {} to the head of the queue", job_id);
        self.update_stats();
    }

    /// Monotonic milestone update. Only a processing job moves, and never
    /// backwards; `Finished` is reserved for the terminal transition.
    fn report_progress(&mut self, job_id: JobId, stage: Stage) -> bool {
        let Some(job) = self.jobs.get_mut(&job_id) else {
            return false;
        };
        if !matches!(job.status, JobStatus::Processing { .. }) || stage == Stage::Finished {
            tracing::debug!("Ignoring {} report for job {} in {}", stage.as_str(), job_id, job.status.as_str());
            return false;
        }

        let progress = stage.progress();
        if progress < job.progress {
            tracing::debug!(
                "Ignoring regressive progress for job {}: {} < {}",
                job_id,
                progress,
                job.progress
            );
            return false;
        }
        if progress == job.progress {
            return true;
        }

        let now = Utc::now();
        job.progress = progress;
        job.stage = stage;
        job.updated_at = now;
        self.broadcast(JobEvent::JobProgress {
            job_id,
            stage,
            progress,
            timestamp: now,
        });
        true
    }

    fn attach_reference(&mut self, job_id: JobId, reference: RepositoryReference) {
        match self.jobs.get_mut(&job_id) {
            Some(job) if matches!(job.status, JobStatus::Processing { .. }) => {
                job.reference = Some(reference);
                job.updated_at = Utc::now();
            }
            _ => tracing::warn!("Not attaching reference to job {}: not processing", job_id),
        }
    }

    /// Take `job_id` out of the running set, returning its start time.
    /// Terminal jobs are never touched again.
    fn finish(&mut self, job_id: JobId) -> Option<DateTime<Utc>> {
        if !self.running.remove(&job_id) {
            return None;
        }
        self.jobs.get(&job_id).and_then(|job| match &job.status {
            JobStatus::Processing { started_at, .. } => Some(*started_at),
            _ => None,
        })
    }

    fn complete(&mut self, job_id: JobId, worker_id: &str, result: ProcessingResult) {
        let Some(started_at) = self.finish(job_id) else {
            tracing::warn!("Ignoring completion of job {} from {}: not processing", job_id, worker_id);
            return;
        };

        let now = Utc::now();
        let duration_ms = (now - started_at).num_milliseconds().max(0) as u64;
        if let Some(job) = self.jobs.get_mut(&job_id) {
            job.status = JobStatus::Completed {
                started_at,
                completed_at: now,
                result: Box::new(result),
            };
            job.stage = Stage::Finished;
            job.progress = Stage::Finished.progress();
            job.updated_at = now;
        }

        self.stats.completed += 1;
        self.stats.record_duration(duration_ms);
        tracing::info!("Job {} completed in {}ms", job_id, duration_ms);
        self.broadcast(JobEvent::JobCompleted {
            job_id,
            duration_ms,
            timestamp: now,
        });
        self.update_stats();
    }

    fn fail(&mut self, job_id: JobId, worker_id: &str, error: JobError) {
        let Some(started_at) = self.finish(job_id) else {
            tracing::warn!("Ignoring failure of job {} from {}: not processing", job_id, worker_id);
            return;
        };

        let now = Utc::now();
        let duration_ms = (now - started_at).num_milliseconds().max(0) as u64;
        tracing::warn!("Job {} failed: {}", job_id, error);
        self.broadcast(JobEvent::JobFailed {
            job_id,
            kind: error.kind,
            message: error.message.clone(),
            timestamp: now,
        });

        if let Some(job) = self.jobs.get_mut(&job_id) {
            job.status = JobStatus::Failed {
                started_at,
                failed_at: now,
                error,
            };
            job.stage = Stage::Finished;
            job.updated_at = now;
        }

        self.stats.failed += 1;
        self.stats.record_duration(duration_ms);
        self.update_stats();
    }

    fn position(&self, job_id: JobId) -> Option<QueuePosition> {
        let job = self.jobs.get(&job_id)?;
        if !matches!(job.status, JobStatus::Queued) {
            return Some(QueuePosition::not_waiting());
        }
        let index = self.pending.iter().position(|id| *id == job_id)?;
        Some(QueuePosition::queued(
            index + 1,
            self.config.concurrency,
            self.stats.avg_duration_ms,
        ))
    }

    fn list(&self, user_id: Option<&UserId>, limit: usize) -> Vec<Job> {
        let mut jobs: Vec<&Job> = self
            .jobs
            .values()
            .filter(|j| user_id.is_none_or(|u| j.is_owned_by(u)))
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        jobs.into_iter().take(limit).cloned().collect()
    }
}

/// Queue actor that tracks every job.
pub struct QueueActor;

impl Actor for QueueActor {
    type Msg = QueueMessage;
    type State = QueueActorState;
    type Arguments = QueueActorState;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            "Starting queue actor (concurrency {})",
            args.config.concurrency
        );
        Ok(args)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            QueueMessage::Submit { job, reply } => {
                let _ = reply.send(state.submit(*job));
            }

            QueueMessage::RequestJob { worker_id, reply } => {
                if reply.is_closed() {
                    tracing::debug!("Worker {} stopped waiting for a job", worker_id);
                    return Ok(());
                }
                let admitted = state.admit(worker_id);
                let announce = admitted.clone();
                match (reply.send(admitted), announce) {
                    (Ok(()), Some(job)) => state.started(&job),
                    (Err(_), Some(job)) => state.requeue(job.id),
                    (_, None) => {}
                }
            }

            QueueMessage::ReportProgress {
                job_id,
                stage,
                reply,
            } => {
                let _ = reply.send(state.report_progress(job_id, stage));
            }

            QueueMessage::AttachReference { job_id, reference } => {
                state.attach_reference(job_id, reference);
            }

            QueueMessage::JobCompleted {
                job_id,
                worker_id,
                result,
            } => {
                state.complete(job_id, &worker_id, *result);
            }

            QueueMessage::JobFailed {
                job_id,
                worker_id,
                error,
            } => {
                state.fail(job_id, &worker_id, error);
            }

            QueueMessage::GetJob { job_id, reply } => {
                let _ = reply.send(state.jobs.get(&job_id).cloned());
            }

            QueueMessage::GetPosition { job_id, reply } => {
                let _ = reply.send(state.position(job_id));
            }

            QueueMessage::ListJobs {
                user_id,
                limit,
                reply,
            } => {
                let _ = reply.send(state.list(user_id.as_ref(), limit));
            }

            QueueMessage::GetStats { reply } => {
                let _ = reply.send(state.stats.clone());
            }

            QueueMessage::Shutdown => {
                tracing::info!(
                    "Shutting down queue actor ({} waiting, {} running)",
                    state.pending.len(),
                    state.running.len()
                );
                myself.stop(None);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_core::{ErrorKind, ResultMetadata};

    fn state(concurrency: u32) -> QueueActorState {
        let (tx, _) = broadcast::channel(16);
        QueueActorState::new(QueueConfig::default().with_concurrency(concurrency), tx)
    }

    fn submit(state: &mut QueueActorState, user: &str) -> JobId {
        let job = Job::new(UserId::new(user), "https://github.com/acme/widgets");
        state.submit(job).unwrap().id
    }

    fn result() -> ProcessingResult {
        ProcessingResult::new(
            ResultMetadata {
                repository_name: "acme/widgets".into(),
                repository_url: "https://github.com/acme/widgets".into(),
                branch: "main".into(),
                file_count: 1,
                total_size_bytes: 10,
                included_files: 1,
                omitted_files: 0,
                truncated: false,
                document_chars: 100,
            },
            "doc",
        )
    }

    #[test]
    fn admits_in_submission_order_up_to_concurrency() {
        let mut s = state(1);
        let a = submit(&mut s, "u");
        let b = submit(&mut s, "u");

        assert_eq!(s.admit("w1".into()).map(|j| j.id), Some(a));
        assert!(s.admit("w2".into()).is_none());
        assert_eq!(s.position(b).unwrap().position, 1);

        s.complete(a, "w1", result());
        assert_eq!(s.admit("w2".into()).map(|j| j.id), Some(b));
        assert_eq!(s.position(b), Some(QueuePosition::not_waiting()));
    }

    #[test]
    fn terminal_jobs_are_never_mutated() {
        let mut s = state(1);
        let a = submit(&mut s, "u");
        s.admit("w1".into());
        s.fail(a, "w1", JobError::new(ErrorKind::NotFound, "gone"));

        s.complete(a, "w1", result());
        assert!(!s.report_progress(a, Stage::Formatted));
        let job = &s.jobs[&a];
        assert_eq!(job.error().map(|e| e.kind), Some(ErrorKind::NotFound));
        assert!(job.result().is_none());
        assert_eq!(s.stats.failed, 1);
        assert_eq!(s.stats.completed, 0);
    }

    #[test]
    fn progress_only_moves_forward() {
        let mut s = state(1);
        let a = submit(&mut s, "u");
        assert!(!s.report_progress(a, Stage::Validated));

        s.admit("w1".into());
        assert!(s.report_progress(a, Stage::Extracted));
        assert!(!s.report_progress(a, Stage::Validated));
        assert!(!s.report_progress(a, Stage::Finished));
        assert_eq!(s.jobs[&a].progress, 75);

        s.complete(a, "w1", result());
        assert_eq!(s.jobs[&a].progress, 100);
    }

    #[test]
    fn capacity_rejects_when_wait_sequence_is_full() {
        let (tx, _) = broadcast::channel(16);
        let mut s = QueueActorState::new(QueueConfig::default().with_max_queue_size(1), tx);
        submit(&mut s, "u");
        let err = s
            .submit(Job::new(UserId::new("u"), "https://github.com/acme/other"))
            .unwrap_err();
        assert_eq!(err, TrackerError::QueueFull { capacity: 1 });
    }

    #[test]
    fn lists_newest_first_per_user() {
        let mut s = state(1);
        let first = submit(&mut s, "alice");
        submit(&mut s, "bob");
        let third = submit(&mut s, "alice");

        let ids: Vec<JobId> = s
            .list(Some(&UserId::new("alice")), 10)
            .into_iter()
            .map(|j| j.id)
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&first) && ids.contains(&third));
        assert_eq!(s.list(None, 2).len(), 2);
    }

    #[test]
    fn undelivered_admission_returns_job_to_head() {
        let mut s = state(1);
        let a = submit(&mut s, "u");
        let b = submit(&mut s, "u");

        let admitted = s.admit("w1".into()).unwrap();
        s.requeue(admitted.id);

        let job = &s.jobs[&a];
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, 0);
        assert_eq!(s.position(a).unwrap().position, 1);
        assert_eq!(s.position(b).unwrap().position, 2);
        assert_eq!(s.stats.running, 0);
        assert_eq!(s.admit("w2".into()).map(|j| j.id), Some(a));
    }

    #[tokio::test]
    async fn abandoned_job_request_does_not_admit() {
        let mut s = state(1);
        let a = submit(&mut s, "u");
        let (queue, handle) = Actor::spawn(None, QueueActor, s).await.unwrap();

        // The worker gave up waiting before the queue got to its request.
        let (tx, rx) = ractor::concurrency::oneshot::<Option<Job>>();
        drop(rx);
        queue
            .send_message(QueueMessage::RequestJob {
                worker_id: "w1".into(),
                reply: tx.into(),
            })
            .unwrap();

        let job = ractor::rpc::call(&queue, |reply| QueueMessage::GetJob { job_id: a, reply }, None)
            .await
            .unwrap();
        let ractor::rpc::CallResult::Success(Some(job)) = job else {
            panic!("job should be tracked");
        };
        assert_eq!(job.status, JobStatus::Queued);

        let position =
            ractor::rpc::call(&queue, |reply| QueueMessage::GetPosition { job_id: a, reply }, None)
                .await
                .unwrap();
        assert!(matches!(
            position,
            ractor::rpc::CallResult::Success(Some(QueuePosition { position: 1, .. }))
        ));

        queue.stop(None);
        handle.await.unwrap();
    }
}
