use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    /// The runner is already executing `max` jobs. Raised before any process
    /// is spawned; the caller must retry once capacity frees up.
    #[error("Runner at capacity: {active} of {max} slots in use")]
    AtCapacity { active: usize, max: usize },

    /// A run for this job ID is already active. Rejected so the existing
    /// run's registry slot and cancellation token stay intact.
    #[error("Job {0} is already running")]
    AlreadyRunning(uuid::Uuid),
}

pub type Result<T> = std::result::Result<T, RunnerError>;
