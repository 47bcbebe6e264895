//! Repository reference validation.

use std::sync::Arc;
use std::time::Duration;

use pipeline_core::{ErrorKind, JobError, RepositoryReference};
use tracing::{debug, info};

use crate::hosting::{HostingError, HostingProvider};
use crate::locator::parse_repository_url;

/// Why a repository URL could not be turned into a reference.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("malformed repository URL '{url}': {reason}")]
    MalformedUrl { url: String, reason: String },

    #[error("repository {owner}/{name} was not found")]
    NotFound { owner: String, name: String },

    #[error("repository {owner}/{name} is private")]
    PrivateRepository { owner: String, name: String },

    #[error("hosting provider unavailable: {0}")]
    ProviderUnavailable(String),
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::MalformedUrl { .. } => ErrorKind::MalformedUrl,
            ValidationError::NotFound { .. } => ErrorKind::NotFound,
            ValidationError::PrivateRepository { .. } => ErrorKind::PrivateRepository,
            ValidationError::ProviderUnavailable(_) => ErrorKind::ProviderUnavailable,
        }
    }
}

impl From<ValidationError> for JobError {
    fn from(e: ValidationError) -> Self {
        JobError::new(e.kind(), e.to_string())
    }
}

impl From<HostingError> for ValidationError {
    fn from(e: HostingError) -> Self {
        ValidationError::ProviderUnavailable(e.to_string())
    }
}

/// Validator settings.
#[derive(Debug, Clone)]
pub struct ValidatorOptions {
    /// Web host accepted in URLs, e.g. `github.com`.
    pub web_host: String,
    /// Upper bound on the provider lookup.
    pub timeout: Duration,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            web_host: "github.com".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Parses URLs and confirms them against the hosting provider.
#[derive(Clone)]
pub struct Validator {
    provider: Arc<dyn HostingProvider>,
    options: ValidatorOptions,
}

impl Validator {
    pub fn new(provider: Arc<dyn HostingProvider>, options: ValidatorOptions) -> Self {
        Self { provider, options }
    }

    /// Turn a user-supplied URL into a normalized reference.
    ///
    /// Does not touch any job; the only side effect is the provider call.
    pub async fn validate(&self, url: &str) -> Result<RepositoryReference, ValidationError> {
        let locator = parse_repository_url(url, &self.options.web_host)?;
        debug!(owner = %locator.owner, name = %locator.name, "URL parsed, checking provider");

        let status = tokio::time::timeout(
            self.options.timeout,
            self.provider.repository_exists(&locator.owner, &locator.name),
        )
        .await
        .map_err(|_| HostingError::Timeout(self.options.timeout))??;

        if !status.exists {
            return Err(ValidationError::NotFound {
                owner: locator.owner,
                name: locator.name,
            });
        }

        let owner = status.canonical_owner.unwrap_or(locator.owner);
        let name = status.canonical_name.unwrap_or(locator.name);

        if status.is_private {
            return Err(ValidationError::PrivateRepository { owner, name });
        }

        let branch = locator
            .branch
            .or(status.default_branch)
            .unwrap_or_else(|| "main".to_string());

        let reference = RepositoryReference {
            url: format!("https://{}/{}/{}", self.options.web_host, owner, name),
            owner,
            name,
            branch,
            is_private: false,
        };
        info!("Validated repository {}", reference);
        Ok(reference)
    }
}
