//! GitHub REST binding of [`HostingProvider`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::hosting::{HostingError, HostingProvider, RepositoryStatus};

/// User-Agent sent with every provider request (GitHub rejects requests without one).
const CLIENT_USER_AGENT: &str = concat!("repo-pipeline/", env!("CARGO_PKG_VERSION"));

/// GitHub API client for repository lookups.
#[derive(Clone)]
pub struct GitHubClient {
    /// HTTP client
    client: reqwest::Client,
    /// Base URL for the API (e.g. "https://api.github.com")
    base_url: String,
    timeout: Duration,
}

impl GitHubClient {
    /// Create a new GitHub API client.
    ///
    /// `token` is optional; without it only public repositories are visible
    /// and the anonymous rate limit applies.
    pub fn new(
        base_url: impl Into<String>,
        token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, HostingError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );

        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| HostingError::Client(format!("invalid token: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| HostingError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> HostingError {
        if e.is_timeout() {
            HostingError::Timeout(self.timeout)
        } else {
            HostingError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl HostingProvider for GitHubClient {
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn repository_exists(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<RepositoryStatus, HostingError> {
        let url = format!("{}/repos/{}/{}", self.base_url, owner, name);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        debug!(%status, "repository lookup answered");

        match status {
            StatusCode::OK => {
                let repo: RepositoryResponse = response
                    .json()
                    .await
                    .map_err(|e| HostingError::Decode(e.to_string()))?;
                Ok(repo.into_status())
            }
            // GitHub answers 404 for private repositories the caller cannot see.
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(RepositoryStatus::missing()),
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                Err(HostingError::RateLimited(status.as_u16()))
            }
            other => {
                let message = response.text().await.unwrap_or_default();
                Err(HostingError::Status {
                    status: other.as_u16(),
                    message: truncate_message(&message),
                })
            }
        }
    }
}

/// Subset of GitHub's repository payload we rely on.
#[derive(Debug, Deserialize)]
struct RepositoryResponse {
    name: String,
    full_name: String,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    visibility: Option<String>,
    default_branch: String,
}

impl RepositoryResponse {
    fn into_status(self) -> RepositoryStatus {
        let owner = self
            .full_name
            .split_once('/')
            .map(|(owner, _)| owner.to_string())
            .unwrap_or_default();
        // "internal" repositories are not anonymously readable either.
        let is_private = self.private || self.visibility.is_some_and(|v| v != "public");
        RepositoryStatus::found(owner, self.name, self.default_branch, is_private)
    }
}

fn truncate_message(message: &str) -> String {
    message.chars().take(200).collect()
}
