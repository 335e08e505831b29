use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::RunnerConfig;
use crate::error::{Result, RunnerError};

/// Marker appended to a captured stream when output exceeded the configured
/// byte limit.
pub const TRUNCATION_MARKER: &str = "\n[output truncated]";

const READ_CHUNK_SIZE: usize = 8192;

/// Execution parameters for one job-runner invocation.
///
/// Defaults (5 minute timeout, 10 MiB output cap) are resolved when the
/// config is built, never re-applied per call.
#[derive(Debug, Clone)]
pub struct JobRunConfig {
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Environment overlay merged over the runner process environment.
    pub env: HashMap<String, String>,
    pub timeout_ms: u64,
    /// Per-stream capture limit in bytes; output past it is discarded.
    pub max_output_bytes: usize,
    /// Advisory only. Accepted for forward compatibility with sandboxed
    /// execution; no OS-level memory ceiling is enforced.
    pub max_memory_mb: Option<u64>,
}

impl JobRunConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            working_dir: None,
            env: HashMap::new(),
            timeout_ms: 300_000,
            max_output_bytes: 10 * 1024 * 1024,
            max_memory_mb: None,
        }
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn max_output_bytes(mut self, max_output_bytes: usize) -> Self {
        self.max_output_bytes = max_output_bytes;
        self
    }

    pub fn max_memory_mb(mut self, max_memory_mb: u64) -> Self {
        self.max_memory_mb = Some(max_memory_mb);
        self
    }
}

/// Outcome of one execution attempt. Immutable once produced.
#[derive(Debug, Clone)]
pub struct JobRunResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub output_truncated: bool,
    pub duration_ms: u64,
    pub timed_out: bool,
    /// True when the process exited due to a termination signal.
    pub killed: bool,
    /// Best-effort runner-process RSS at completion, not a per-job
    /// measurement. 0 when unavailable.
    pub peak_memory_bytes: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl JobRunResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }
}

/// Executes job commands as child processes with a wall-clock timeout,
/// bounded output capture, and bounded concurrency.
///
/// Admission control is immediate: a [`run`](Self::run) call past
/// `max_concurrent` fails with [`RunnerError::AtCapacity`] before anything
/// is spawned, and the caller retries once capacity frees up. There is no
/// internal wait queue.
#[derive(Debug, Clone)]
pub struct JobRunner {
    max_concurrent: usize,
    active: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
}

impl Default for JobRunner {
    fn default() -> Self {
        Self::new(RunnerConfig::default())
    }
}

impl JobRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            max_concurrent: config.max_concurrent,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Execute `config.command` for `job_id`, racing it against the timeout.
    ///
    /// Process-level failures (non-zero exit, spawn error, timeout, kill) are
    /// reported inside the returned [`JobRunResult`], never as `Err`. The
    /// only `Err` is the admission rejection.
    pub async fn run(&self, job_id: Uuid, config: JobRunConfig) -> Result<JobRunResult> {
        let token = CancellationToken::new();
        {
            // Check and insert under one lock so concurrent calls cannot
            // over-admit.
            let mut active = self.lock_active();
            if active.len() >= self.max_concurrent {
                return Err(RunnerError::AtCapacity {
                    active: active.len(),
                    max: self.max_concurrent,
                });
            }
            match active.entry(job_id) {
                // Overwriting would orphan the live run's token and let two
                // guards race on one slot.
                std::collections::hash_map::Entry::Occupied(_) => {
                    return Err(RunnerError::AlreadyRunning(job_id));
                }
                std::collections::hash_map::Entry::Vacant(slot) => {
                    slot.insert(token.clone());
                }
            }
        }
        let _slot = SlotGuard {
            active: Arc::clone(&self.active),
            job_id,
        };

        tracing::info!(
            job_id = %job_id,
            command = %config.command,
            timeout_ms = config.timeout_ms,
            "Executing job"
        );

        let started_at = Utc::now();
        let start = Instant::now();

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &config.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to spawn job process");
                let completed_at = Utc::now();
                return Ok(JobRunResult {
                    exit_code: 1,
                    stdout: String::new(),
                    stderr: format!("failed to spawn process: {e}"),
                    output_truncated: false,
                    duration_ms: start.elapsed().as_millis() as u64,
                    timed_out: false,
                    killed: false,
                    peak_memory_bytes: resident_memory_bytes(),
                    started_at,
                    completed_at,
                });
            }
        };

        let stdout_task = child
            .stdout
            .take()
            .map(|r| tokio::spawn(capture_stream(r, config.max_output_bytes)));
        let stderr_task = child
            .stderr
            .take()
            .map(|r| tokio::spawn(capture_stream(r, config.max_output_bytes)));

        let mut timed_out = false;
        tokio::select! {
            _ = child.wait() => {}
            _ = tokio::time::sleep(Duration::from_millis(config.timeout_ms)) => {
                tracing::warn!(job_id = %job_id, timeout_ms = config.timeout_ms, "Job timed out, killing process");
                timed_out = true;
            }
            _ = token.cancelled() => {
                tracing::info!(job_id = %job_id, "Job cancelled, killing process");
                timed_out = true;
            }
        }
        if timed_out {
            let _ = child.start_kill();
        }
        // Second wait is a no-op when the child already exited; tokio caches
        // the status.
        let wait_result = child.wait().await;

        let (exit_code, killed) = match &wait_result {
            Ok(status) => (status.code().unwrap_or(1), exited_by_signal(status)),
            Err(_) => (1, false),
        };

        let (stdout, stdout_truncated) = join_capture(stdout_task).await;
        let (stderr, stderr_truncated) = join_capture(stderr_task).await;
        let output_truncated = stdout_truncated || stderr_truncated;

        let completed_at = Utc::now();
        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            job_id = %job_id,
            exit_code,
            timed_out,
            duration_ms,
            "Job run finished"
        );

        Ok(JobRunResult {
            exit_code,
            stdout,
            stderr,
            output_truncated,
            duration_ms,
            timed_out,
            killed,
            peak_memory_bytes: resident_memory_bytes(),
            started_at,
            completed_at,
        })
    }

    /// Signal cancellation for an active run. Returns false when the job is
    /// not running. Best-effort: the run completes through the kill path once
    /// the OS delivers the signal.
    pub fn cancel(&self, job_id: Uuid) -> bool {
        match self.lock_active().get(&job_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every active run. Shutdown path.
    pub fn cancel_all(&self) {
        for token in self.lock_active().values() {
            token.cancel();
        }
    }

    pub fn active_count(&self) -> usize {
        self.lock_active().len()
    }

    pub fn active_job_ids(&self) -> Vec<Uuid> {
        self.lock_active().keys().copied().collect()
    }

    pub fn is_running(&self, job_id: Uuid) -> bool {
        self.lock_active().contains_key(&job_id)
    }

    fn lock_active(&self) -> MutexGuard<'_, HashMap<Uuid, CancellationToken>> {
        // The lock is only held for map operations, never across an await, so
        // a poisoned lock means a panic mid-map-op and the map is unusable.
        self.active.lock().expect("active run registry poisoned")
    }
}

/// Releases the registry slot when a run finishes, on every path including
/// panics and early returns.
struct SlotGuard {
    active: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
    job_id: Uuid,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if let Ok(mut active) = self.active.lock() {
            active.remove(&self.job_id);
        }
    }
}

/// Drain a stream to completion, keeping at most `limit` bytes. The stream
/// keeps draining past the limit so the child never blocks on a full pipe.
async fn capture_stream(
    mut reader: impl tokio::io::AsyncRead + Unpin,
    limit: usize,
) -> (Vec<u8>, bool) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    let mut truncated = false;
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                if buf.len() < limit {
                    let take = n.min(limit - buf.len());
                    buf.extend_from_slice(&chunk[..take]);
                    if take < n {
                        truncated = true;
                    }
                } else {
                    truncated = true;
                }
            }
            Err(_) => break,
        }
    }
    (buf, truncated)
}

async fn join_capture(
    task: Option<tokio::task::JoinHandle<(Vec<u8>, bool)>>,
) -> (String, bool) {
    match task {
        Some(handle) => match handle.await {
            Ok((bytes, truncated)) => {
                let mut text = String::from_utf8_lossy(&bytes).into_owned();
                if truncated {
                    text.push_str(TRUNCATION_MARKER);
                }
                (text, truncated)
            }
            Err(_) => (String::new(), false),
        },
        None => (String::new(), false),
    }
}

#[cfg(unix)]
fn exited_by_signal(status: &std::process::ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    status.signal().is_some()
}

#[cfg(not(unix))]
fn exited_by_signal(_status: &std::process::ExitStatus) -> bool {
    false
}

/// Resident set size of the runner process, from /proc. Advisory: this is a
/// host-process measurement, not a per-job one.
#[cfg(target_os = "linux")]
fn resident_memory_bytes() -> u64 {
    let page_size = 4096u64;
    std::fs::read_to_string("/proc/self/statm")
        .ok()
        .and_then(|s| s.split_whitespace().nth(1).and_then(|v| v.parse::<u64>().ok()))
        .map(|pages| pages * page_size)
        .unwrap_or(0)
}

#[cfg(not(target_os = "linux"))]
fn resident_memory_bytes() -> u64 {
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_config_defaults() {
        let cfg = JobRunConfig::new("true");
        assert_eq!(cfg.timeout_ms, 300_000);
        assert_eq!(cfg.max_output_bytes, 10 * 1024 * 1024);
        assert!(cfg.max_memory_mb.is_none());
        assert!(cfg.args.is_empty());
        assert!(cfg.working_dir.is_none());
    }

    #[tokio::test]
    async fn capture_respects_limit() {
        let data = vec![b'x'; 500];
        let (bytes, truncated) = capture_stream(&data[..], 100).await;
        assert_eq!(bytes.len(), 100);
        assert!(truncated);
    }

    #[tokio::test]
    async fn capture_under_limit_not_truncated() {
        let data = b"hello".to_vec();
        let (bytes, truncated) = capture_stream(&data[..], 100).await;
        assert_eq!(bytes, b"hello");
        assert!(!truncated);
    }
}
