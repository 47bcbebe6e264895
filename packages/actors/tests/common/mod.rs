#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actors::{HandlerFuture, JobHandler, JobTracker, ProgressReporter, start_tracker};
use pipeline_core::{
    ErrorKind, Job, JobError, JobId, ProcessingResult, QueueConfig, ResultMetadata, Stage,
};
use tokio::sync::Semaphore;

/// Handler that holds every job until the test releases a permit.
///
/// URLs containing `missing` fail with `NotFound`.
#[derive(Clone)]
pub struct GatedHandler {
    pub gate: Arc<Semaphore>,
    pub active: Arc<AtomicUsize>,
    pub peak: Arc<AtomicUsize>,
    pub started: Arc<Mutex<Vec<String>>>,
}

impl GatedHandler {
    pub fn new() -> Self {
        Self {
            gate: Arc::new(Semaphore::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
            started: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn release(&self, jobs: usize) {
        self.gate.add_permits(jobs);
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl JobHandler for GatedHandler {
    fn handle(&self, job: &Job, progress: ProgressReporter) -> HandlerFuture {
        let handler = self.clone();
        let url = job.source_url.clone();
        Box::pin(async move {
            handler.started.lock().unwrap().push(url.clone());
            let now = handler.active.fetch_add(1, Ordering::SeqCst) + 1;
            handler.peak.fetch_max(now, Ordering::SeqCst);

            progress.report(Stage::Validated).await;
            let permit = handler.gate.acquire().await;
            handler.active.fetch_sub(1, Ordering::SeqCst);
            permit
                .map_err(|_| JobError::internal("gate closed"))?
                .forget();

            progress.report(Stage::Extracted).await;
            progress.report(Stage::Formatted).await;
            if url.contains("missing") {
                return Err(JobError::new(ErrorKind::NotFound, "repository was not found"));
            }
            Ok(result_for(&url))
        })
    }
}

pub fn result_for(url: &str) -> ProcessingResult {
    ProcessingResult::new(
        ResultMetadata {
            repository_name: "acme/widgets".into(),
            repository_url: url.into(),
            branch: "main".into(),
            file_count: 1,
            total_size_bytes: 12,
            included_files: 1,
            omitted_files: 0,
            truncated: false,
            document_chars: 64,
        },
        format!("document for {url}"),
    )
}

pub fn config(concurrency: u32) -> QueueConfig {
    QueueConfig::default()
        .with_concurrency(concurrency)
        .with_poll_interval_ms(10)
}

pub async fn tracker(concurrency: u32, handler: &GatedHandler) -> JobTracker {
    start_tracker(config(concurrency), Arc::new(handler.clone()))
        .await
        .expect("tracker starts")
}

/// Poll until the job satisfies `done`, failing the test after five seconds.
pub async fn wait_for(tracker: &JobTracker, job_id: JobId, done: impl Fn(&Job) -> bool) -> Job {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(job) = tracker.get_status(job_id).await.expect("tracker reachable")
                && done(&job)
            {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("job reached the expected state in time")
}

pub async fn wait_terminal(tracker: &JobTracker, job_id: JobId) -> Job {
    wait_for(tracker, job_id, |job| job.status.is_terminal()).await
}

pub async fn wait_processing(tracker: &JobTracker, job_id: JobId) -> Job {
    wait_for(tracker, job_id, |job| job.status.as_str() == "processing").await
}
