//! Content extraction through the ingestion service.

use std::sync::Arc;
use std::time::Duration;

use pipeline_core::{ErrorKind, ExtractedContent, ExtractedFile, JobError, RepositoryReference};
use tracing::{debug, info};

use crate::filter::ContentFilter;
use crate::ingest::{IngestError, IngestRequest, IngestionApi};

/// Why content could not be extracted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("extraction did not finish within {0:?}")]
    Timeout(Duration),

    #[error("repository content ({}) exceeds the {limit}-byte ceiling", describe_size(*reported_bytes))]
    TooLarge {
        reported_bytes: Option<u64>,
        limit: u64,
    },

    #[error("ingestion provider error: {0}")]
    Provider(String),
}

fn describe_size(bytes: Option<u64>) -> String {
    match bytes {
        Some(b) => format!("{} bytes", b),
        None => "size not reported".to_string(),
    }
}

impl ExtractionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractionError::Timeout(_) => ErrorKind::ExtractionTimeout,
            ExtractionError::TooLarge { .. } => ErrorKind::ExtractionTooLarge,
            ExtractionError::Provider(_) => ErrorKind::ProviderError,
        }
    }
}

impl From<ExtractionError> for JobError {
    fn from(e: ExtractionError) -> Self {
        JobError::new(e.kind(), e.to_string())
    }
}

/// Extractor settings.
#[derive(Debug, Clone)]
pub struct ExtractorOptions {
    /// Fixed deadline for the ingestion call.
    pub timeout: Duration,
    /// Byte ceiling for the whole slice; larger repositories are rejected.
    pub max_total_bytes: u64,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_total_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Pulls filtered repository text through an [`IngestionApi`].
#[derive(Clone)]
pub struct Extractor {
    api: Arc<dyn IngestionApi>,
    filter: ContentFilter,
    options: ExtractorOptions,
}

impl Extractor {
    pub fn new(api: Arc<dyn IngestionApi>, filter: ContentFilter, options: ExtractorOptions) -> Self {
        Self {
            api,
            filter,
            options,
        }
    }

    /// The request sent for `reference`.
    pub fn request_for(&self, reference: &RepositoryReference) -> IngestRequest {
        IngestRequest {
            repository_url: reference.url.clone(),
            owner: reference.owner.clone(),
            name: reference.name.clone(),
            branch: reference.branch.clone(),
            exclude_patterns: self.filter.exclude_patterns(),
            max_file_size: self.filter.max_file_bytes(),
            max_total_bytes: self.options.max_total_bytes,
        }
    }

    /// Extract text content for `reference`.
    ///
    /// Oversized repositories are rejected rather than truncated; the
    /// formatter owns truncation. Safe to call repeatedly.
    pub async fn extract(
        &self,
        reference: &RepositoryReference,
    ) -> Result<ExtractedContent, ExtractionError> {
        let limit = self.options.max_total_bytes;
        let request = self.request_for(reference);

        let response = tokio::time::timeout(self.options.timeout, self.api.extract_content(&request))
            .await
            .map_err(|_| ExtractionError::Timeout(self.options.timeout))?
            .map_err(|e| self.map_ingest_error(e))?;

        if response.total_bytes > limit {
            return Err(ExtractionError::TooLarge {
                reported_bytes: Some(response.total_bytes),
                limit,
            });
        }

        let delivered = response.files.len();
        let files: Vec<ExtractedFile> = response
            .files
            .into_iter()
            .map(|f| ExtractedFile::new(f.path, f.content))
            .filter(|file| match self.filter.exclusion(file) {
                Some(reason) => {
                    debug!(path = %file.path, reason, "Skipping file");
                    false
                }
                None => true,
            })
            .collect();

        let content = ExtractedContent::from_files(files);
        // The service may under-report; the ceiling applies to what we keep.
        if content.total_bytes > limit {
            return Err(ExtractionError::TooLarge {
                reported_bytes: Some(content.total_bytes),
                limit,
            });
        }

        info!(
            "Extracted {} of {} files ({} bytes) from {}",
            content.file_count(),
            delivered,
            content.total_bytes,
            reference
        );
        Ok(content)
    }

    fn map_ingest_error(&self, e: IngestError) -> ExtractionError {
        match e {
            IngestError::Timeout(_) => ExtractionError::Timeout(self.options.timeout),
            IngestError::TooLarge { reported_bytes } => ExtractionError::TooLarge {
                reported_bytes,
                limit: self.options.max_total_bytes,
            },
            other => ExtractionError::Provider(other.to_string()),
        }
    }
}
