pub mod job;
pub mod queue;
pub mod selector;

pub use job::{JobPriority, JobSpec, JobStatus, QueuedJob};
pub use queue::JobQueue;
pub use selector::{LeastLoaded, NodeSelector, NodeSnapshot, NodeStatus, SelectionStrategy};
