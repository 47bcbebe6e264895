#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use api::{Job, JobId, PipelineConfig, PipelineService, UserId, start_pipeline};
use async_trait::async_trait;
use sources::{
    HostingError, HostingProvider, IngestError, IngestRequest, IngestResponse, IngestedFile,
    IngestionApi, RepositoryStatus,
};

/// Hosting provider answering from a fixed table keyed by lowercase `owner/name`.
#[derive(Default)]
pub struct FakeHosting {
    repos: HashMap<String, RepositoryStatus>,
}

impl FakeHosting {
    pub fn with_public(mut self, owner: &str, name: &str) -> Self {
        self.repos.insert(
            format!("{owner}/{name}").to_lowercase(),
            RepositoryStatus::found(owner, name, "main", false),
        );
        self
    }

    pub fn with_private(mut self, owner: &str, name: &str) -> Self {
        self.repos.insert(
            format!("{owner}/{name}").to_lowercase(),
            RepositoryStatus::found(owner, name, "main", true),
        );
        self
    }
}

#[async_trait]
impl HostingProvider for FakeHosting {
    async fn repository_exists(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<RepositoryStatus, HostingError> {
        Ok(self
            .repos
            .get(&format!("{owner}/{name}").to_lowercase())
            .cloned()
            .unwrap_or_else(RepositoryStatus::missing))
    }
}

/// Ingestion service returning the same files for every repository.
pub struct FakeIngestion {
    files: Vec<IngestedFile>,
    reported_bytes: Option<u64>,
    delay: Duration,
}

impl FakeIngestion {
    pub fn new(files: &[(&str, &str)]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(path, content)| IngestedFile {
                    path: path.to_string(),
                    content: content.to_string(),
                })
                .collect(),
            reported_bytes: None,
            delay: Duration::ZERO,
        }
    }

    pub fn reporting_bytes(mut self, bytes: u64) -> Self {
        self.reported_bytes = Some(bytes);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl IngestionApi for FakeIngestion {
    async fn extract_content(&self, _request: &IngestRequest) -> Result<IngestResponse, IngestError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let total_bytes = self
            .reported_bytes
            .unwrap_or_else(|| self.files.iter().map(|f| f.content.len() as u64).sum());
        Ok(IngestResponse {
            files: self.files.clone(),
            total_bytes,
        })
    }
}

pub fn config(concurrency: u32) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.queue = config
        .queue
        .with_concurrency(concurrency)
        .with_poll_interval_ms(10);
    config
}

pub async fn service(
    config: &PipelineConfig,
    hosting: FakeHosting,
    ingestion: FakeIngestion,
) -> PipelineService {
    start_pipeline(config, Arc::new(hosting), Arc::new(ingestion))
        .await
        .expect("pipeline starts")
}

pub fn alice() -> UserId {
    UserId::new("alice")
}

/// Poll until the job is terminal, failing the test after five seconds.
pub async fn wait_terminal(service: &PipelineService, job_id: JobId, owner: &UserId) -> Job {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(job) = service.get_status(job_id, owner).await.expect("owner may read")
                && job.status.is_terminal()
            {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("job finished in time")
}

pub async fn wait_processing(service: &PipelineService, job_id: JobId, owner: &UserId) -> Job {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(job) = service.get_status(job_id, owner).await.expect("owner may read")
                && job.status.as_str() == "processing"
            {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("job admitted in time")
}
