//! Capability interface to the repository hosting provider.

use std::time::Duration;

use async_trait::async_trait;

/// What the provider knows about a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryStatus {
    pub exists: bool,
    pub is_private: bool,
    pub default_branch: Option<String>,
    /// Owner with the provider's casing.
    pub canonical_owner: Option<String>,
    /// Name with the provider's casing.
    pub canonical_name: Option<String>,
}

impl RepositoryStatus {
    /// The provider has no such repository (or will not admit to it).
    pub fn missing() -> Self {
        Self {
            exists: false,
            is_private: false,
            default_branch: None,
            canonical_owner: None,
            canonical_name: None,
        }
    }

    /// The repository exists.
    pub fn found(
        owner: impl Into<String>,
        name: impl Into<String>,
        default_branch: impl Into<String>,
        is_private: bool,
    ) -> Self {
        Self {
            exists: true,
            is_private,
            default_branch: Some(default_branch.into()),
            canonical_owner: Some(owner.into()),
            canonical_name: Some(name.into()),
        }
    }
}

/// Failure talking to the hosting provider. Always transient from the
/// pipeline's point of view.
#[derive(Debug, thiserror::Error)]
pub enum HostingError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("rate limited by hosting provider (HTTP {0})")]
    RateLimited(u16),

    #[error("hosting provider returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("client setup failed: {0}")]
    Client(String),
}

/// Existence/visibility lookup against a hosting provider.
#[async_trait]
pub trait HostingProvider: Send + Sync {
    /// Look up `owner/name`. A missing repository is `Ok` with
    /// `exists == false`, not an error.
    async fn repository_exists(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<RepositoryStatus, HostingError>;
}
