//! Public surface of the repository processing pipeline.
//!
//! This crate wires the stages together:
//! - `RepositoryProcessor` runs validate, extract and format for one job
//! - `PipelineService` submits jobs and serves owner-checked lookups
//! - `PipelineConfig` loads settings from TOML and the environment
//! - `init_pipeline` starts everything with the HTTP collaborators

mod config;
mod init;
mod processor;
mod service;

pub use config::{
    ConfigError, ENV_CONCURRENCY, ENV_INGEST_URL, FormatterConfig, HostingConfig,
    IngestionConfig, PipelineConfig,
};
pub use init::{InitError, build_processor, init_pipeline, start_pipeline};
pub use processor::{RepositoryProcessor, format_for_llm};
pub use service::{JobOutput, OwnedEvents, PipelineService, ResultFormat, ServiceError};

// Re-export core types for convenience
pub use pipeline_core::{
    ErrorKind, Job, JobError, JobEvent, JobId, JobStatus, ProcessingResult, QueuePosition,
    QueueStats, Stage, UserId,
};
