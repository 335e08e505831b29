//! Job execution engine.
//!
//! Runs one external process per job with:
//! - **Bounded concurrency**: at most `max_concurrent` simultaneous runs,
//!   enforced by admission control (reject, never queue)
//! - **Wall-clock timeout**: the process is killed when `timeout_ms` elapses
//! - **Bounded capture**: stdout/stderr are kept up to `max_output_bytes`
//!   each, with a marker appended on truncation
//! - **Cooperative cancellation**: [`JobRunner::cancel`] signals the run's
//!   token and the run completes through the kill path
//!
//! Process failures (non-zero exit, spawn error, timeout) come back as data
//! in [`JobRunResult`](runner::JobRunResult); the admission rejection is the
//! only error.

pub mod runner;

pub use runner::{JobRunConfig, JobRunResult, JobRunner};
