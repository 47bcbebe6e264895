//! Capability interface to the content ingestion service, plus its HTTP binding.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const CLIENT_USER_AGENT: &str = concat!("repo-pipeline/", env!("CARGO_PKG_VERSION"));

/// What to pull from a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestRequest {
    pub repository_url: String,
    pub owner: String,
    pub name: String,
    pub branch: String,
    /// Glob patterns the service should skip.
    pub exclude_patterns: Vec<String>,
    /// Skip individual files larger than this.
    pub max_file_size: u64,
    /// Refuse repositories whose filtered content exceeds this.
    pub max_total_bytes: u64,
}

/// A file as returned by the ingestion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestedFile {
    pub path: String,
    pub content: String,
}

/// Ingestion service response body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResponse {
    #[serde(default)]
    pub files: Vec<IngestedFile>,
    /// Total content size the service reports for the slice.
    #[serde(default)]
    pub total_bytes: u64,
}

/// Failure talking to the ingestion service.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("ingestion timed out after {0:?}")]
    Timeout(Duration),

    #[error("repository content too large for ingestion")]
    TooLarge { reported_bytes: Option<u64> },

    #[error("ingestion service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("client setup failed: {0}")]
    Client(String),
}

/// Bulk content extraction service.
#[async_trait]
pub trait IngestionApi: Send + Sync {
    async fn extract_content(&self, request: &IngestRequest) -> Result<IngestResponse, IngestError>;
}

/// HTTP client for a JSON ingestion service (`POST {base}/v1/ingest`).
#[derive(Clone)]
pub struct IngestClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl IngestClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, IngestError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| IngestError::Client(format!("invalid API key: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| IngestError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }
}

#[async_trait]
impl IngestionApi for IngestClient {
    #[instrument(skip_all, fields(repo = %request.repository_url, branch = %request.branch))]
    async fn extract_content(&self, request: &IngestRequest) -> Result<IngestResponse, IngestError> {
        let url = format!("{}/v1/ingest", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    IngestError::Timeout(self.timeout)
                } else {
                    IngestError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        debug!(%status, "ingestion answered");

        match status {
            s if s.is_success() => response.json::<IngestResponse>().await.map_err(|e| {
                if e.is_timeout() {
                    IngestError::Timeout(self.timeout)
                } else {
                    IngestError::Decode(e.to_string())
                }
            }),
            StatusCode::PAYLOAD_TOO_LARGE => Err(IngestError::TooLarge {
                reported_bytes: None,
            }),
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
                Err(IngestError::Timeout(self.timeout))
            }
            other => {
                let message: String = response
                    .text()
                    .await
                    .unwrap_or_default()
                    .chars()
                    .take(200)
                    .collect();
                Err(IngestError::Status {
                    status: other.as_u16(),
                    message,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> IngestRequest {
        IngestRequest {
            repository_url: "https://github.com/acme/widgets".into(),
            owner: "acme".into(),
            name: "widgets".into(),
            branch: "main".into(),
            exclude_patterns: vec!["*.png".into()],
            max_file_size: 1024,
            max_total_bytes: 4096,
        }
    }

    #[tokio::test]
    async fn test_posts_request_and_decodes_files() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/ingest"))
            .and(header("authorization", "Bearer k3y"))
            .and(body_partial_json(serde_json::json!({
                "owner": "acme",
                "branch": "main",
                "max_total_bytes": 4096
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "files": [{"path": "src/lib.rs", "content": "pub fn f() {}"}],
                "total_bytes": 13
            })))
            .mount(&server)
            .await;

        let client = IngestClient::new(server.uri(), Some("k3y"), Duration::from_secs(5)).unwrap();
        let response = client.extract_content(&request()).await.unwrap();
        assert_eq!(response.files.len(), 1);
        assert_eq!(response.total_bytes, 13);
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/ingest"))
            .respond_with(ResponseTemplate::new(413))
            .mount(&server)
            .await;

        let client = IngestClient::new(server.uri(), None, Duration::from_secs(5)).unwrap();
        assert!(matches!(
            client.extract_content(&request()).await,
            Err(IngestError::TooLarge { .. })
        ));

        let failing = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&failing)
            .await;
        let client = IngestClient::new(failing.uri(), None, Duration::from_secs(5)).unwrap();
        match client.extract_content(&request()).await {
            Err(IngestError::Status { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_deadline_maps_to_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let client = IngestClient::new(server.uri(), None, Duration::from_millis(100)).unwrap();
        assert!(matches!(
            client.extract_content(&request()).await,
            Err(IngestError::Timeout(_))
        ));
    }
}
