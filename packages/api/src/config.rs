//! Pipeline configuration.
//!
//! Loaded from a TOML file when one is given, otherwise defaults. Secrets
//! are never stored in the file: each section names the environment
//! variable that holds them.

use std::path::Path;
use std::time::Duration;

use pipeline_core::QueueConfig;
use serde::{Deserialize, Serialize};

/// Overrides `[ingestion] api_base_url`.
pub const ENV_INGEST_URL: &str = "REPO_PIPELINE_INGEST_URL";
/// Overrides `[queue] concurrency`.
pub const ENV_CONCURRENCY: &str = "REPO_PIPELINE_CONCURRENCY";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: String, reason: String },
}

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub hosting: HostingConfig,

    #[serde(default)]
    pub ingestion: IngestionConfig,

    #[serde(default)]
    pub formatter: FormatterConfig,
}

/// `[hosting]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostingConfig {
    #[serde(default = "default_hosting_api")]
    pub api_base_url: String,

    /// Host accepted in repository URLs.
    #[serde(default = "default_web_host")]
    pub web_host: String,

    /// Name of the env var holding an API token (optional).
    #[serde(default = "default_token_env")]
    pub token_env: String,

    #[serde(default = "default_hosting_timeout")]
    pub timeout_secs: u64,
}

impl Default for HostingConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_hosting_api(),
            web_host: default_web_host(),
            token_env: default_token_env(),
            timeout_secs: default_hosting_timeout(),
        }
    }
}

impl HostingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The token, if its env var is set and non-empty.
    pub fn token(&self) -> Option<String> {
        read_secret(&self.token_env)
    }
}

fn default_hosting_api() -> String {
    "https://api.github.com".into()
}
fn default_web_host() -> String {
    "github.com".into()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".into()
}
fn default_hosting_timeout() -> u64 {
    10
}

/// `[ingestion]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    #[serde(default = "default_ingest_api")]
    pub api_base_url: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_ingest_timeout")]
    pub timeout_secs: u64,

    /// Repositories with more filtered content than this are rejected.
    #[serde(default = "default_max_total_bytes")]
    pub max_total_bytes: u64,

    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    /// Extra exclusions: `dir/`, `*.ext` or an exact file name.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_ingest_api(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_ingest_timeout(),
            max_total_bytes: default_max_total_bytes(),
            max_file_bytes: default_max_file_bytes(),
            exclude_patterns: Vec::new(),
        }
    }
}

impl IngestionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn api_key(&self) -> Option<String> {
        read_secret(&self.api_key_env)
    }
}

fn default_ingest_api() -> String {
    "http://localhost:8000".into()
}
fn default_api_key_env() -> String {
    "INGEST_API_KEY".into()
}
fn default_ingest_timeout() -> u64 {
    60
}
fn default_max_total_bytes() -> u64 {
    5 * 1024 * 1024
}
fn default_max_file_bytes() -> u64 {
    512 * 1024
}

/// `[formatter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatterConfig {
    /// Character budget for the generated document.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    formatter::DEFAULT_MAX_CHARS
}

fn read_secret(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

impl PipelineConfig {
    /// Load from `path` if given (defaults otherwise), then apply env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_toml_str(&raw)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `REPO_PIPELINE_*` overrides looked up through `lookup`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = lookup(ENV_INGEST_URL).filter(|v| !v.is_empty()) {
            self.ingestion.api_base_url = url;
        }
        if let Some(raw) = lookup(ENV_CONCURRENCY) {
            let concurrency = raw.trim().parse::<u32>().map_err(|e| ConfigError::Invalid {
                name: ENV_CONCURRENCY.into(),
                reason: e.to_string(),
            })?;
            self.queue.concurrency = concurrency;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue.concurrency == 0 {
            return Err(invalid("queue.concurrency", "must be at least 1"));
        }
        if self.formatter.max_chars == 0 {
            return Err(invalid("formatter.max_chars", "must be positive"));
        }
        if self.ingestion.max_file_bytes > self.ingestion.max_total_bytes {
            return Err(invalid(
                "ingestion.max_file_bytes",
                "must not exceed ingestion.max_total_bytes",
            ));
        }
        for (name, value) in [
            ("hosting.api_base_url", &self.hosting.api_base_url),
            ("ingestion.api_base_url", &self.ingestion.api_base_url),
        ] {
            url::Url::parse(value).map_err(|e| invalid(name, &e.to_string()))?;
        }
        Ok(())
    }
}

fn invalid(name: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        name: name.into(),
        reason: reason.into(),
    }
}
