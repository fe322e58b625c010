//! Shared pending-job queue.

use super::job::Job;
use super::response::{DispatchResult, JobError, JobResponse};
use crate::{Error, Result};
use futures::future::join_all;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Handle returned by [`JobQueue::on_jobs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type JobsListener = Arc<dyn Fn() + Send + Sync>;

struct QueueEntry {
    job: Job,
    settle: oneshot::Sender<JobResponse>,
}

impl QueueEntry {
    fn settle(self, response: JobResponse) {
        // The submitter may have stopped waiting; the job still ran.
        if self.settle.send(response).is_err() {
            debug!(path = self.job.path(), "job settled after its submitter went away");
        }
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ordered collection of pending jobs shared by submitters and one worker.
///
/// Submitters only ever append; removal happens through [`JobQueue::acquire_at`],
/// which takes jobs out and hands them to an executor in one step.
pub struct JobQueue {
    entries: Mutex<VecDeque<QueueEntry>>,
    listeners: Mutex<Vec<(ListenerId, JobsListener)>>,
    next_listener: AtomicU64,
    max_pending: Option<usize>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            max_pending: None,
        }
    }

    /// Reject submissions that would grow the queue past `limit` pending jobs.
    pub fn with_max_pending(mut self, limit: usize) -> Self {
        self.max_pending = Some(limit.max(1));
        self
    }

    pub fn max_pending(&self) -> Option<usize> {
        self.max_pending
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inspect the job at `index` without removing it.
    pub fn peek_at(&self, index: usize) -> Option<Job> {
        lock(&self.entries).get(index).map(|entry| entry.job.clone())
    }

    /// Borrow the job at `index` for the duration of `f`, without cloning it.
    pub fn with_job_at<R>(&self, index: usize, f: impl FnOnce(&Job) -> R) -> Option<R> {
        lock(&self.entries).get(index).map(|entry| f(&entry.job))
    }

    /// Remove `count` jobs starting at `index` and run them through `executor`.
    ///
    /// Removal happens before this function returns, so the jobs are never
    /// observed both queued and in flight. The returned future runs the
    /// executor and settles every removed job: with the executor's response
    /// for it, or with the executor's error if it failed as a whole. In the
    /// latter case the error is also returned to the caller. Dropping the
    /// future settles the removed jobs as [`JobError::Abandoned`].
    pub fn acquire_at<F, Fut>(
        &self,
        index: usize,
        count: usize,
        executor: F,
    ) -> impl Future<Output = std::result::Result<Vec<JobResponse>, JobError>> + Send + 'static
    where
        F: FnOnce(Vec<Job>) -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<Vec<JobResponse>, JobError>> + Send + 'static,
    {
        let acquired: Vec<QueueEntry> = {
            let mut entries = lock(&self.entries);
            let start = index.min(entries.len());
            let end = index.saturating_add(count).min(entries.len());
            entries.drain(start..end).collect()
        };

        async move {
            if acquired.is_empty() {
                return Ok(Vec::new());
            }

            let jobs: Vec<Job> = acquired.iter().map(|entry| entry.job.clone()).collect();
            let expected = jobs.len();

            match executor(jobs).await {
                Ok(responses) => {
                    let received = responses.len();
                    let mut responses = responses.into_iter();
                    let mut settled = Vec::with_capacity(expected);
                    for entry in acquired {
                        let response = responses.next().unwrap_or_else(|| {
                            JobResponse::failure(
                                entry.job.clone(),
                                JobError::Executor(format!(
                                    "executor returned {} responses for {} jobs",
                                    received, expected
                                )),
                            )
                        });
                        entry.settle(response.clone());
                        settled.push(response);
                    }
                    Ok(settled)
                }
                Err(err) => {
                    warn!(jobs = expected, error = %err, "job executor failed");
                    for entry in acquired {
                        let response = JobResponse::failure(entry.job.clone(), err.clone());
                        entry.settle(response);
                    }
                    Err(err)
                }
            }
        }
    }

    /// Submit `jobs` and wait until every one of them has settled.
    ///
    /// Other submissions may interleave in the queue; this call only waits for
    /// its own jobs and returns their responses in submission order.
    pub async fn execute_jobs(&self, jobs: Vec<Job>) -> Result<DispatchResult> {
        if jobs.is_empty() {
            return Ok(DispatchResult::from_batch(Vec::new()));
        }

        let pending = {
            let mut entries = lock(&self.entries);
            if let Some(limit) = self.max_pending {
                if entries.len() + jobs.len() > limit {
                    return Err(Error::QueueFull {
                        pending: entries.len(),
                        incoming: jobs.len(),
                        limit,
                    });
                }
            }

            jobs.into_iter()
                .map(|job| {
                    let (settle, settled) = oneshot::channel();
                    entries.push_back(QueueEntry {
                        job: job.clone(),
                        settle,
                    });
                    (job, settled)
                })
                .collect::<Vec<_>>()
        };

        debug!(jobs = pending.len(), "jobs submitted");
        self.emit_jobs();

        let batch = join_all(pending.into_iter().map(|(job, settled)| async move {
            settled
                .await
                .unwrap_or_else(|_| JobResponse::failure(job, JobError::Abandoned))
        }))
        .await;

        Ok(DispatchResult::from_batch(batch))
    }

    /// Register a callback fired after every submission.
    pub fn on_jobs<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        lock(&self.listeners).push((id, Arc::new(listener)));
        id
    }

    pub fn remove_jobs_listener(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    fn emit_jobs(&self) {
        let listeners: Vec<JobsListener> = lock(&self.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener();
        }
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}
