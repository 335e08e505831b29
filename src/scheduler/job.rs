use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Priority levels for queued jobs. Lower number means more urgent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum JobPriority {
    Critical = 0,
    High = 1,
    Normal = 2,
    Low = 3,
    Background = 4,
}

impl JobPriority {
    pub const ALL: [JobPriority; 5] = [
        JobPriority::Critical,
        JobPriority::High,
        JobPriority::Normal,
        JobPriority::Low,
        JobPriority::Background,
    ];
}

impl std::fmt::Display for JobPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobPriority::Critical => write!(f, "critical"),
            JobPriority::High => write!(f, "high"),
            JobPriority::Normal => write!(f, "normal"),
            JobPriority::Low => write!(f, "low"),
            JobPriority::Background => write!(f, "background"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    /// A single failed attempt, as reported by orchestrators. The queue
    /// itself re-queues or dead-letters on failure and never stores this.
    Failed,
    DeadLetter,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::DeadLetter => write!(f, "dead-letter"),
        }
    }
}

/// A unit of work tracked by the [`JobQueue`](crate::scheduler::JobQueue).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedJob {
    pub id: Uuid,
    pub name: String,
    pub payload: Value,
    pub priority: JobPriority,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Message from the most recent failure, if any.
    pub error: Option<String>,
    /// Minimum time after `enqueued_at` before the job is eligible for
    /// dequeue. Also carries the retry backoff after a failure.
    pub delay_ms: u64,
    /// When set, the job only runs on this node.
    pub target_node_id: Option<String>,
}

/// Enqueue options for a new job, with defaults resolved at build time.
///
/// # Example
///
/// ```
/// use forge_cluster::scheduler::{JobPriority, JobSpec};
///
/// let spec = JobSpec::new("build")
///     .priority(JobPriority::High)
///     .max_attempts(5)
///     .delay_ms(1500);
/// ```
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub(crate) name: String,
    pub(crate) payload: Value,
    pub(crate) priority: JobPriority,
    pub(crate) max_attempts: u32,
    pub(crate) delay_ms: u64,
    pub(crate) target_node_id: Option<String>,
}

impl JobSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: Value::Null,
            priority: JobPriority::Normal,
            max_attempts: 3,
            delay_ms: 0,
            target_node_id: None,
        }
    }

    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Pin the job to a specific node.
    pub fn pinned_to(mut self, node_id: impl Into<String>) -> Self {
        self.target_node_id = Some(node_id.into());
        self
    }

    pub(crate) fn into_job(self, now: DateTime<Utc>) -> QueuedJob {
        QueuedJob {
            id: Uuid::new_v4(),
            name: self.name,
            payload: self.payload,
            priority: self.priority,
            status: JobStatus::Queued,
            attempts: 0,
            max_attempts: self.max_attempts,
            enqueued_at: now,
            started_at: None,
            completed_at: None,
            error: None,
            delay_ms: self.delay_ms,
            target_node_id: self.target_node_id,
        }
    }
}
