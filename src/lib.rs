//! Cluster job scheduling and queueing core.
//!
//! Three independent building blocks, wired together by an orchestrator that
//! lives outside this crate:
//!
//! - [`scheduler::JobQueue`] — priority-ordered in-memory queue with retry
//!   backoff and a capped dead-letter store
//! - [`worker::JobRunner`] — bounded-concurrency execution of job commands
//!   as child processes, with timeout and output capture
//! - [`scheduler::NodeSelector`] — pluggable-strategy choice of the best
//!   execution target from a caller-supplied node snapshot
//!
//! The queue and selector are plain synchronous structures; construct them
//! explicitly and share behind a mutex if needed. All state is in-memory and
//! lost on restart.

pub mod config;
pub mod error;
pub mod events;
pub mod scheduler;
pub mod worker;

pub use config::{QueueConfig, RunnerConfig};
pub use error::{Result, RunnerError};
pub use events::QueueEvent;
pub use scheduler::{
    JobPriority, JobQueue, JobSpec, JobStatus, NodeSelector, NodeSnapshot, NodeStatus, QueuedJob,
};
pub use worker::{JobRunConfig, JobRunResult, JobRunner};
