//! Error taxonomy shared by every pipeline stage and the tracker.

use serde::{Deserialize, Serialize};

/// Stable, machine-readable classification of a pipeline failure.
///
/// Clients key retry decisions off this value, so variant codes are part of
/// the public contract and must not be renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    // Validator
    MalformedUrl,
    NotFound,
    PrivateRepository,
    ProviderUnavailable,

    // Extractor
    ExtractionTimeout,
    ExtractionTooLarge,
    ProviderError,

    // Formatter
    FormattingBudgetExceeded,

    // Tracker / caller-facing
    JobNotFound,
    AccessDenied,
    InvalidState,
    QueueFull,

    /// A stage panicked or the tracker could not be reached.
    Internal,
}

impl ErrorKind {
    /// Snake-case code used in serialized payloads and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MalformedUrl => "malformed_url",
            ErrorKind::NotFound => "not_found",
            ErrorKind::PrivateRepository => "private_repository",
            ErrorKind::ProviderUnavailable => "provider_unavailable",
            ErrorKind::ExtractionTimeout => "extraction_timeout",
            ErrorKind::ExtractionTooLarge => "extraction_too_large",
            ErrorKind::ProviderError => "provider_error",
            ErrorKind::FormattingBudgetExceeded => "formatting_budget_exceeded",
            ErrorKind::JobNotFound => "job_not_found",
            ErrorKind::AccessDenied => "access_denied",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::QueueFull => "queue_full",
            ErrorKind::Internal => "internal",
        }
    }

    /// Whether resubmitting the same request may succeed later.
    ///
    /// Upstream availability problems and queue backpressure qualify; a
    /// missing or private repository fails the same way on every attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorKind::ProviderUnavailable | ErrorKind::ExtractionTimeout | ErrorKind::QueueFull
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure recorded on a job that reached `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct JobError {
    pub kind: ErrorKind,
    pub message: String,
}

impl JobError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}
