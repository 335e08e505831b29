use tokio::sync::broadcast;
use uuid::Uuid;

use crate::scheduler::job::JobPriority;

/// State-transition notifications published by the job queue.
///
/// Events are a side channel for observers (dashboards, alerting); queue
/// correctness never depends on whether anyone is subscribed.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    Enqueued {
        job_id: Uuid,
        name: String,
        priority: JobPriority,
    },
    Started {
        job_id: Uuid,
        attempts: u32,
    },
    Completed {
        job_id: Uuid,
    },
    Retried {
        job_id: Uuid,
        attempts: u32,
        delay_ms: u64,
    },
    DeadLettered {
        job_id: Uuid,
        attempts: u32,
    },
}

pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 256;

pub(crate) fn channel() -> broadcast::Sender<QueueEvent> {
    broadcast::channel(EVENT_CHANNEL_CAPACITY).0
}
