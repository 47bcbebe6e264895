use pipeline_core::ErrorKind;

/// Errors returned by the tracker to its callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    #[error("queue is full ({capacity} jobs waiting)")]
    QueueFull { capacity: usize },

    #[error("tracker unavailable: {0}")]
    Unavailable(String),
}

impl TrackerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TrackerError::QueueFull { .. } => ErrorKind::QueueFull,
            TrackerError::Unavailable(_) => ErrorKind::Internal,
        }
    }
}
