//! Wiring of the default collaborators into a running pipeline.

use std::sync::Arc;

use actors::{JobHandler, start_tracker};
use formatter::Formatter;
use sources::{
    ContentFilter, Extractor, ExtractorOptions, GitHubClient, HostingProvider, IngestClient,
    IngestionApi, Validator, ValidatorOptions,
};

use crate::config::PipelineConfig;
use crate::processor::RepositoryProcessor;
use crate::service::PipelineService;

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("hosting client: {0}")]
    Hosting(#[from] sources::HostingError),

    #[error("ingestion client: {0}")]
    Ingestion(#[from] sources::IngestError),

    #[error("tracker: {0}")]
    Tracker(#[from] actors::TrackerError),
}

/// Build the processor from explicit collaborators.
pub fn build_processor(
    config: &PipelineConfig,
    hosting: Arc<dyn HostingProvider>,
    ingestion: Arc<dyn IngestionApi>,
) -> RepositoryProcessor {
    let validator = Validator::new(
        hosting,
        ValidatorOptions {
            web_host: config.hosting.web_host.clone(),
            timeout: config.hosting.timeout(),
        },
    );

    let filter = ContentFilter::new(config.ingestion.max_file_bytes)
        .with_patterns(&config.ingestion.exclude_patterns);
    let extractor = Extractor::new(
        ingestion,
        filter,
        ExtractorOptions {
            timeout: config.ingestion.timeout(),
            max_total_bytes: config.ingestion.max_total_bytes,
        },
    );

    RepositoryProcessor::new(validator, extractor, Formatter::new(config.formatter.max_chars))
}

/// Start a pipeline over explicit collaborators.
pub async fn start_pipeline(
    config: &PipelineConfig,
    hosting: Arc<dyn HostingProvider>,
    ingestion: Arc<dyn IngestionApi>,
) -> Result<PipelineService, InitError> {
    let processor: Arc<dyn JobHandler> = Arc::new(build_processor(config, hosting, ingestion));
    let tracker = start_tracker(config.queue.clone(), processor).await?;
    Ok(PipelineService::new(tracker))
}

/// Start a pipeline using the HTTP clients described by `config`.
///
/// Call once at startup; the returned service is cheap to clone.
pub async fn init_pipeline(config: &PipelineConfig) -> Result<PipelineService, InitError> {
    tracing::info!("Initializing repository pipeline...");

    let token = config.hosting.token();
    if token.is_none() {
        tracing::info!(
            "{} not set, using anonymous hosting API access",
            config.hosting.token_env
        );
    }
    let hosting = GitHubClient::new(
        &config.hosting.api_base_url,
        token.as_deref(),
        config.hosting.timeout(),
    )?;

    let api_key = config.ingestion.api_key();
    let ingestion = IngestClient::new(
        &config.ingestion.api_base_url,
        api_key.as_deref(),
        config.ingestion.timeout(),
    )?;

    let service = start_pipeline(config, Arc::new(hosting), Arc::new(ingestion)).await?;
    tracing::info!(
        "Repository pipeline ready ({} workers, hosting {}, ingestion {})",
        config.queue.concurrency,
        config.hosting.api_base_url,
        config.ingestion.api_base_url
    );
    Ok(service)
}
