/// Configuration for the job queue's retry and dead-letter behavior.
///
/// Resolved once at construction; the queue never re-reads defaults per call.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum number of dead-lettered jobs retained. Oldest entries are
    /// evicted first once the cap is exceeded.
    pub dead_letter_cap: usize,
    /// Base retry delay in milliseconds. Attempt `n` waits
    /// `backoff_base_ms * 2^n`, capped at `backoff_cap_ms`.
    pub backoff_base_ms: u64,
    /// Ceiling on the retry delay, preventing unbounded backoff growth.
    pub backoff_cap_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            dead_letter_cap: 1000,
            backoff_base_ms: 1000,
            backoff_cap_ms: 60_000,
        }
    }
}

/// Configuration for the job runner.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Maximum number of concurrently executing jobs. Runs past this limit
    /// are rejected at admission, never queued.
    pub max_concurrent: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self { max_concurrent: 4 }
    }
}
