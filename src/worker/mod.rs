//! 调度器模块：按执行键串行、按连接数限流地消费任务队列。
//!
//! Worker: drains a [`JobQueue`] against the remote API.
//!
//! Two constraints hold at all times:
//! - at most `max_connections` jobs are in flight;
//! - at most one job per [`ExecutionKey`] is in flight.
//!
//! On start, on every submission and on every completion the worker scans the
//! queue from the front. A job whose key is locked is skipped, and the scan
//! keeps looking further back so a free slot is never wasted on a key
//! collision. Because a key stays locked until its job settles and the queue
//! keeps submission order, jobs sharing a key run strictly in order; jobs of
//! different keys may finish in any order.
//!
//! A failed call is not retried. Its error is attached to that job's
//! response and the worker carries on exactly as after a success.

mod agent;
mod signals;

pub use agent::JobAgent;
pub use signals::WorkerSnapshot;

use crate::queue::{lock, ExecutionKey, Job, JobError, JobQueue, JobResponse, ListenerId};
use crate::resilience::rate_limiter::RateLimiter;
use crate::transport::TransportError;
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

pub const DEFAULT_MAX_CONNECTIONS: usize = 100;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub max_connections: usize,
    /// Upper bound for one remote call, on top of the transport's own timeout.
    pub call_timeout: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            call_timeout: None,
        }
    }
}

impl WorkerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_connections(mut self, n: usize) -> Self {
        self.max_connections = n.max(1);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }
}

#[derive(Default)]
struct SchedulerState {
    started: bool,
    connection_count: usize,
    locked_keys: HashSet<ExecutionKey>,
    queue: Option<Arc<JobQueue>>,
    listener: Option<ListenerId>,
    runtime: Option<Handle>,
}

struct WorkerInner {
    agent: Arc<dyn JobAgent>,
    max_connections: usize,
    call_timeout: Option<Duration>,
    rate_limiter: Option<Arc<RateLimiter>>,
    state: Mutex<SchedulerState>,
}

/// One connection slot plus the job's key lock. Dropping it frees both and rescans.
struct Slot {
    inner: Arc<WorkerInner>,
    key: Option<ExecutionKey>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.inner.release(self.key.take());
    }
}

/// Per-adapter scheduler. Cheap to clone; clones share one scheduler.
#[derive(Clone)]
pub struct Worker {
    inner: Arc<WorkerInner>,
}

impl Worker {
    pub fn new(agent: Arc<dyn JobAgent>, config: WorkerConfig) -> Self {
        Self::with_rate_limiter(agent, config, None)
    }

    pub fn with_rate_limiter(
        agent: Arc<dyn JobAgent>,
        config: WorkerConfig,
        rate_limiter: Option<Arc<RateLimiter>>,
    ) -> Self {
        Self {
            inner: Arc::new(WorkerInner {
                agent,
                max_connections: config.max_connections.max(1),
                call_timeout: config.call_timeout,
                rate_limiter,
                state: Mutex::new(SchedulerState::default()),
            }),
        }
    }

    pub fn max_connections(&self) -> usize {
        self.inner.max_connections
    }

    pub fn is_started(&self) -> bool {
        lock(&self.inner.state).started
    }

    /// Attach to `queue` and start draining it. Returns `false` if already started.
    ///
    /// Jobs run on the tokio runtime `start` is called from, even when later
    /// submissions come from outside it.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn start(&self, queue: Arc<JobQueue>) -> bool {
        {
            let mut state = lock(&self.inner.state);
            if state.started {
                return false;
            }

            let weak: Weak<WorkerInner> = Arc::downgrade(&self.inner);
            let listener = queue.on_jobs(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.scan();
                }
            });

            state.started = true;
            state.queue = Some(queue);
            state.listener = Some(listener);
            state.runtime = Some(Handle::current());
        }

        info!(
            max_connections = self.inner.max_connections,
            "dispatch worker started"
        );
        self.inner.scan();
        true
    }

    /// Stop scanning. Jobs already in flight still complete and report.
    /// Returns `false` if not started.
    pub fn stop(&self) -> bool {
        let (queue, listener, in_flight) = {
            let mut state = lock(&self.inner.state);
            if !state.started {
                return false;
            }
            state.started = false;
            state.runtime = None;
            (
                state.queue.take(),
                state.listener.take(),
                state.connection_count,
            )
        };

        if let (Some(queue), Some(listener)) = (queue, listener) {
            queue.remove_jobs_listener(listener);
        }
        info!(in_flight, "dispatch worker stopped");
        true
    }

    pub async fn snapshot(&self) -> WorkerSnapshot {
        let mut snapshot = {
            let state = lock(&self.inner.state);
            let mut locked_keys: Vec<ExecutionKey> = state.locked_keys.iter().cloned().collect();
            locked_keys.sort();
            WorkerSnapshot {
                started: state.started,
                max_connections: self.inner.max_connections,
                connection_count: state.connection_count,
                locked_keys,
                pending: state.queue.as_ref().map(|q| q.len()).unwrap_or(0),
                rate_limiter: None,
            }
        };
        if let Some(limiter) = &self.inner.rate_limiter {
            snapshot.rate_limiter = Some(limiter.snapshot().await);
        }
        snapshot
    }
}

impl WorkerInner {
    fn scan(self: &Arc<Self>) {
        let mut executions = Vec::new();
        let runtime = {
            let mut state = lock(&self.state);
            if !state.started {
                return;
            }
            let (Some(queue), Some(runtime)) = (state.queue.clone(), state.runtime.clone()) else {
                return;
            };

            let mut index = 0;
            while state.connection_count < self.max_connections {
                let locked_keys = &state.locked_keys;
                let Some(candidate) = queue.with_job_at(index, |job| match job.execution_key() {
                    Some(key) if locked_keys.contains(key) => None,
                    key => Some(key.cloned()),
                }) else {
                    break;
                };
                let Some(key) = candidate else {
                    index += 1;
                    continue;
                };

                if let Some(key) = &key {
                    state.locked_keys.insert(key.clone());
                }
                state.connection_count += 1;

                debug!(
                    index,
                    key = key.as_ref().map(ExecutionKey::as_str),
                    in_flight = state.connection_count,
                    "dispatching job"
                );

                let slot = Slot {
                    inner: Arc::clone(self),
                    key,
                };
                let executor = Arc::clone(self);
                // The job leaves the queue here, so `index` now points at its successor.
                executions.push(queue.acquire_at(index, 1, move |jobs| async move {
                    let outcome = AssertUnwindSafe(executor.execute(jobs))
                        .catch_unwind()
                        .await;
                    // Free the slot before any submitter hears back.
                    drop(slot);
                    outcome.map_err(|_| {
                        warn!("job execution panicked");
                        JobError::Abandoned
                    })
                }));
            }
            runtime
        };

        for execution in executions {
            runtime.spawn(async move {
                if let Err(err) = execution.await {
                    debug!(error = %err, "job execution failed");
                }
            });
        }
    }

    fn release(self: &Arc<Self>, key: Option<ExecutionKey>) {
        {
            let mut state = lock(&self.state);
            state.connection_count = state.connection_count.saturating_sub(1);
            if let Some(key) = &key {
                state.locked_keys.remove(key);
            }
        }
        self.scan();
    }

    async fn execute(&self, jobs: Vec<Job>) -> Vec<JobResponse> {
        let mut responses = Vec::with_capacity(jobs.len());
        for job in jobs {
            let result = self.call(&job).await;
            responses.push(JobResponse::new(job, result));
        }
        responses
    }

    async fn call(&self, job: &Job) -> Result<Value, JobError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.acquire().await;
        }

        let start = Instant::now();
        let result = match self.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.agent.execute(job)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(limit).into()),
            },
            None => self.agent.execute(job).await,
        };

        if let (Some(limiter), Err(JobError::Api(err))) = (&self.rate_limiter, &result) {
            if let Some(ms) = err.retry_after_ms {
                limiter.block_for(Duration::from_millis(ms)).await;
            }
        }

        debug!(
            path = job.path(),
            success = result.is_ok(),
            duration_ms = start.elapsed().as_millis() as u64,
            "job settled"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoAgent;

    #[async_trait]
    impl JobAgent for EchoAgent {
        async fn execute(&self, job: &Job) -> Result<Value, JobError> {
            Ok(job.payload().cloned().unwrap_or_default())
        }
    }

    struct HangingAgent;

    #[async_trait]
    impl JobAgent for HangingAgent {
        async fn execute(&self, _job: &Job) -> Result<Value, JobError> {
            futures::future::pending::<()>().await;
            Ok(Value::Null)
        }
    }

    /// Panics on jobs posted to `boom`.
    struct PanickingAgent;

    #[async_trait]
    impl JobAgent for PanickingAgent {
        async fn execute(&self, job: &Job) -> Result<Value, JobError> {
            if job.path() == "boom" {
                panic!("agent blew up");
            }
            Ok(json!({ "path": job.path() }))
        }
    }

    #[tokio::test]
    async fn test_start_and_stop_are_idempotent() {
        let queue = Arc::new(JobQueue::new());
        let worker = Worker::new(Arc::new(EchoAgent), WorkerConfig::new());

        assert!(worker.start(Arc::clone(&queue)));
        assert!(!worker.start(Arc::clone(&queue)));
        assert!(worker.is_started());

        assert!(worker.stop());
        assert!(!worker.stop());
        assert!(!worker.is_started());
    }

    #[tokio::test]
    async fn test_worker_drains_queue() {
        let queue = Arc::new(JobQueue::new());
        let worker = Worker::new(Arc::new(EchoAgent), WorkerConfig::new());
        worker.start(Arc::clone(&queue));

        let result = queue
            .execute_jobs(vec![
                Job::post("a", json!({ "n": 1 })),
                Job::post("b", json!({ "n": 2 })),
            ])
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.batch[1].value(), Some(&json!({ "n": 2 })));

        let snapshot = worker.snapshot().await;
        assert!(snapshot.is_idle());
        assert!(snapshot.locked_keys.is_empty());
    }

    #[tokio::test]
    async fn test_stopped_worker_leaves_jobs_queued() {
        let queue = Arc::new(JobQueue::new());
        let worker = Worker::new(Arc::new(EchoAgent), WorkerConfig::new());
        worker.start(Arc::clone(&queue));
        worker.stop();

        let submitter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.execute_jobs(vec![Job::post("a", json!({}))]).await })
        };
        while queue.is_empty() {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(queue.len(), 1);

        // Restarting picks the backlog up.
        worker.start(Arc::clone(&queue));
        let result = submitter.await.unwrap().unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_call_timeout_frees_slot_and_key() {
        let queue = Arc::new(JobQueue::new());
        let worker = Worker::new(
            Arc::new(HangingAgent),
            WorkerConfig::new()
                .with_max_connections(1)
                .with_call_timeout(Duration::from_millis(30)),
        );
        worker.start(Arc::clone(&queue));

        let result = queue
            .execute_jobs(vec![
                Job::post("a", json!({})).with_execution_key("k"),
                Job::post("b", json!({})).with_execution_key("k"),
            ])
            .await
            .unwrap();

        assert_eq!(result.errors.as_ref().map(Vec::len), Some(2));
        for response in &result.batch {
            match response.error() {
                Some(JobError::Transport(err)) => assert!(err.is_timeout()),
                other => panic!("expected timeout, got {:?}", other),
            }
        }
        assert_eq!(worker.snapshot().await.connection_count, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_job_is_abandoned_and_key_moves_on() {
        let queue = Arc::new(JobQueue::new());
        let worker = Worker::new(
            Arc::new(PanickingAgent),
            WorkerConfig::new().with_max_connections(1),
        );
        worker.start(Arc::clone(&queue));

        let result = queue
            .execute_jobs(vec![
                Job::post("boom", json!({})).with_execution_key("k"),
                Job::post("after", json!({})).with_execution_key("k"),
            ])
            .await
            .unwrap();

        assert!(matches!(result.batch[0].error(), Some(JobError::Abandoned)));
        assert_eq!(result.batch[1].value(), Some(&json!({ "path": "after" })));

        let snapshot = worker.snapshot().await;
        assert_eq!(snapshot.connection_count, 0);
        assert!(snapshot.locked_keys.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_slot_is_free_once_the_submitter_hears_back() {
        let queue = Arc::new(JobQueue::new());
        let worker = Worker::new(Arc::new(EchoAgent), WorkerConfig::new().with_max_connections(1));
        worker.start(Arc::clone(&queue));

        for n in 0..2000 {
            let result = queue
                .execute_jobs(vec![Job::post("a", json!({ "n": n })).with_execution_key("k")])
                .await
                .unwrap();
            assert!(result.success);

            let snapshot = worker.snapshot().await;
            assert_eq!(snapshot.connection_count, 0, "slot still held after job {}", n);
            assert!(snapshot.locked_keys.is_empty(), "key still locked after job {}", n);
        }
    }
}
