//! Core domain types for the repository processing pipeline.
//!
//! This crate contains shared types used across all packages:
//! - Job, JobStatus and Stage for tracked work items
//! - RepositoryReference, ExtractedContent and ProcessingResult for stage data
//! - ErrorKind and JobError for the failure taxonomy
//! - QueueConfig, QueueStats and QueuePosition for the tracker
//! - Events for push-style updates

mod content;
mod error;
mod events;
mod job;
mod queue;
mod reference;
mod result;

pub use content::{ExtractedContent, ExtractedFile};
pub use error::{ErrorKind, JobError};
pub use events::JobEvent;
pub use job::{Job, JobId, JobStatus, Stage, UserId};
pub use queue::{QueueConfig, QueuePosition, QueueStats};
pub use reference::RepositoryReference;
pub use result::{ProcessingResult, ResultMetadata};
