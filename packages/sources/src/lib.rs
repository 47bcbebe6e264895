//! Repository-facing stages: URL validation against the hosting provider
//! and content extraction through the ingestion service.

mod extractor;
mod filter;
mod github;
mod hosting;
mod ingest;
mod locator;
mod validator;

pub use extractor::{ExtractionError, Extractor, ExtractorOptions};
pub use filter::ContentFilter;
pub use github::GitHubClient;
pub use hosting::{HostingError, HostingProvider, RepositoryStatus};
pub use ingest::{IngestClient, IngestError, IngestRequest, IngestResponse, IngestedFile, IngestionApi};
pub use locator::{RepositoryLocator, parse_repository_url};
pub use validator::{ValidationError, Validator, ValidatorOptions};
