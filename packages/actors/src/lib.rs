//! Actor system for the job tracker.
//!
//! This crate provides the Ractor-based actors that own job state and run
//! the pipeline:
//!
//! # Architecture
//!
//! - `QueueActor` - Owns the job table and the FIFO wait sequence, enforces
//!   the concurrency limit
//! - `WorkerActor` - Pulls admitted jobs and runs them through a `JobHandler`
//! - `JobTracker` - Cloneable handle returned by `start_tracker`
//!
//! # Usage
//!
//! ```ignore
//! use actors::start_tracker;
//!
//! let tracker = start_tracker(QueueConfig::default(), Arc::new(handler)).await?;
//! let job = tracker.submit(UserId::new("alice"), "https://github.com/acme/widgets").await?;
//! let status = tracker.get_status(job.id).await?;
//! ```

mod error;
mod handler;
mod messages;
mod queue_actor;
mod tracker;
mod worker_actor;

pub use error::TrackerError;
pub use handler::{FnHandler, HandlerFuture, HandlerResult, JobHandler, ProgressReporter};
pub use messages::{QueueMessage, WorkerMessage};
pub use queue_actor::{QueueActor, QueueActorState};
pub use tracker::{JobTracker, start_tracker};
pub use worker_actor::{WorkerActor, WorkerArgs};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef, RpcReplyPort, concurrency};
