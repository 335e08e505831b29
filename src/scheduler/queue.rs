use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::events::{self, QueueEvent};
use crate::scheduler::job::{JobPriority, JobSpec, JobStatus, QueuedJob};

/// Priority-ordered, in-memory job queue with retry backoff and a capped
/// dead-letter store.
///
/// Three internal stores, and a job ID lives in at most one of them at any
/// instant:
/// - `pending` — jobs awaiting dequeue, kept sorted by priority with FIFO
///   order within each priority level
/// - `processing` — jobs owned by a consumer between `dequeue` and
///   `complete`/`fail`
/// - `dead_letter` — jobs that exhausted their attempts, oldest evicted
///   first once the cap is reached
///
/// All operations run to completion without suspension; wrap the queue in a
/// single mutex if it is shared across tasks.
#[derive(Debug)]
pub struct JobQueue {
    pending: Vec<QueuedJob>,
    processing: HashMap<Uuid, QueuedJob>,
    dead_letter: VecDeque<QueuedJob>,
    config: QueueConfig,
    events: broadcast::Sender<QueueEvent>,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueue {
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    pub fn with_config(config: QueueConfig) -> Self {
        Self {
            pending: Vec::new(),
            processing: HashMap::new(),
            dead_letter: VecDeque::new(),
            config,
            events: events::channel(),
        }
    }

    /// Subscribe to queue state-transition events. Events are dropped when no
    /// receiver is attached or a receiver lags; the queue never waits on them.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    /// Add a new job to the queue. Returns a copy of the stored job record.
    pub fn enqueue(&mut self, spec: JobSpec) -> QueuedJob {
        let job = spec.into_job(Utc::now());
        tracing::debug!(
            job_id = %job.id,
            name = %job.name,
            priority = %job.priority,
            delay_ms = job.delay_ms,
            "Job enqueued"
        );
        let _ = self.events.send(QueueEvent::Enqueued {
            job_id: job.id,
            name: job.name.clone(),
            priority: job.priority,
        });
        let cloned = job.clone();
        self.insert_pending(job);
        cloned
    }

    /// Take the next eligible job, flipping it to `processing`.
    ///
    /// A job is eligible when its delay has elapsed and it is not pinned to a
    /// different node. A pinned job is skipped only when both the job's
    /// target and the caller's `node_id` are set and differ, so a caller
    /// passing `None` still receives pinned work.
    ///
    /// Returns `None` when nothing is eligible; never blocks.
    pub fn dequeue(&mut self, node_id: Option<&str>) -> Option<QueuedJob> {
        self.dequeue_at(node_id, Utc::now())
    }

    /// [`dequeue`](Self::dequeue) against a caller-supplied clock, for
    /// deterministic testing of delay and backoff behavior.
    pub fn dequeue_at(
        &mut self,
        node_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<QueuedJob> {
        let idx = self.pending.iter().position(|job| {
            // Saturating conversion: a delay past i64::MAX ms must stay
            // ineligible, not wrap negative.
            let delay = i64::try_from(job.delay_ms).unwrap_or(i64::MAX);
            let ready = (now - job.enqueued_at).num_milliseconds() >= delay;
            let pinned_elsewhere = matches!(
                (&job.target_node_id, node_id),
                (Some(target), Some(node)) if target != node
            );
            ready && !pinned_elsewhere
        })?;

        let mut job = self.pending.remove(idx);
        job.status = JobStatus::Processing;
        job.started_at = Some(now);
        job.attempts += 1;
        tracing::debug!(
            job_id = %job.id,
            name = %job.name,
            attempts = job.attempts,
            "Job dequeued"
        );
        let _ = self.events.send(QueueEvent::Started {
            job_id: job.id,
            attempts: job.attempts,
        });
        let cloned = job.clone();
        self.processing.insert(job.id, job);
        Some(cloned)
    }

    /// Mark a processing job as completed and release it. Returns false if
    /// the ID is not currently processing, so duplicate completion reports
    /// are a no-op.
    pub fn complete(&mut self, job_id: Uuid) -> bool {
        let Some(mut job) = self.processing.remove(&job_id) else {
            return false;
        };
        job.status = JobStatus::Completed;
        job.completed_at = Some(Utc::now());
        tracing::info!(job_id = %job_id, name = %job.name, "Job completed");
        let _ = self.events.send(QueueEvent::Completed { job_id });
        true
    }

    /// Record a failed attempt. Re-queues the job with exponential backoff
    /// while attempts remain, otherwise dead-letters it. Returns false if the
    /// ID is not currently processing.
    pub fn fail(&mut self, job_id: Uuid, error: impl Into<String>) -> bool {
        let Some(mut job) = self.processing.remove(&job_id) else {
            return false;
        };
        job.error = Some(error.into());

        if job.attempts < job.max_attempts {
            let backoff = self.backoff_ms(job.attempts);
            job.status = JobStatus::Queued;
            job.started_at = None;
            job.delay_ms = backoff;
            // Backoff is measured from the retry, not the original enqueue.
            job.enqueued_at = Utc::now();
            tracing::info!(
                job_id = %job_id,
                name = %job.name,
                attempts = job.attempts,
                delay_ms = backoff,
                "Job failed, scheduling retry"
            );
            let _ = self.events.send(QueueEvent::Retried {
                job_id,
                attempts: job.attempts,
                delay_ms: backoff,
            });
            self.insert_pending(job);
        } else {
            job.status = JobStatus::DeadLetter;
            job.completed_at = Some(Utc::now());
            tracing::warn!(
                job_id = %job_id,
                name = %job.name,
                attempts = job.attempts,
                "Job exhausted retries, dead-lettered"
            );
            let _ = self.events.send(QueueEvent::DeadLettered {
                job_id,
                attempts: job.attempts,
            });
            if self.dead_letter.len() >= self.config.dead_letter_cap {
                self.dead_letter.pop_front();
            }
            self.dead_letter.push_back(job);
        }
        true
    }

    /// Look up a job across the pending queue, the processing set, and the
    /// dead-letter store, in that order.
    pub fn get_job(&self, job_id: &Uuid) -> Option<&QueuedJob> {
        self.pending
            .iter()
            .find(|j| j.id == *job_id)
            .or_else(|| self.processing.get(job_id))
            .or_else(|| self.dead_letter.iter().find(|j| j.id == *job_id))
    }

    /// Count of pending (not processing) jobs per priority level. All five
    /// levels are present in the result, including empty ones.
    pub fn depth_by_priority(&self) -> BTreeMap<JobPriority, usize> {
        let mut depth: BTreeMap<JobPriority, usize> =
            JobPriority::ALL.iter().map(|p| (*p, 0)).collect();
        for job in &self.pending {
            if let Some(count) = depth.get_mut(&job.priority) {
                *count += 1;
            }
        }
        depth
    }

    /// Jobs that exhausted all attempts, oldest first.
    pub fn dead_letter_jobs(&self) -> impl Iterator<Item = &QueuedJob> {
        self.dead_letter.iter()
    }

    /// Empty all three stores. Test/reset path only; never call this with
    /// jobs in flight.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.processing.clear();
        self.dead_letter.clear();
    }

    /// Number of pending jobs.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn processing_count(&self) -> usize {
        self.processing.len()
    }

    pub fn dead_letter_count(&self) -> usize {
        self.dead_letter.len()
    }

    /// Insert before the first entry with a strictly greater priority number,
    /// preserving FIFO order among equal priorities.
    fn insert_pending(&mut self, job: QueuedJob) {
        let pos = self
            .pending
            .iter()
            .position(|existing| existing.priority > job.priority)
            .unwrap_or(self.pending.len());
        self.pending.insert(pos, job);
    }

    /// Delay before attempt `attempts + 1`: base * 2^attempts, capped.
    fn backoff_ms(&self, attempts: u32) -> u64 {
        let exp = attempts.min(16);
        self.config
            .backoff_base_ms
            .saturating_mul(1u64 << exp)
            .min(self.config.backoff_cap_ms)
    }
}
