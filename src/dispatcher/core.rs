use super::render::{DispatchTarget, Renderer};
use crate::builder::JobBuilder;
use crate::line::{ChatJobBuilder, ChatThread, MulticastJobBuilder, MulticastTarget, ReplyToken};
use crate::queue::{DispatchResult, Job, JobError, JobQueue};
use crate::worker::{Worker, WorkerSnapshot};
use crate::{Error, Result};
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Entry point: render, build, queue, wait, report.
///
/// Owns one queue and the worker draining it. The worker is started on
/// construction and runs until [`Dispatcher::shutdown`].
pub struct Dispatcher<R: Renderer> {
    queue: Arc<JobQueue>,
    worker: Worker,
    renderer: R,
}

impl<R: Renderer> Dispatcher<R> {
    /// Starts `worker` on `queue`; must run inside a tokio runtime.
    pub fn new(queue: Arc<JobQueue>, worker: Worker, renderer: R) -> Self {
        worker.start(Arc::clone(&queue));
        Self {
            queue,
            worker,
            renderer,
        }
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    pub fn worker(&self) -> &Worker {
        &self.worker
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Render `node` for `target`, build jobs with `builder` and wait for all of them.
    ///
    /// Returns `Ok(None)` when rendering produced nothing. Build failures are
    /// returned before anything is queued. If any job fails the call returns
    /// [`Error::Dispatch`], which carries every job error and the full result.
    pub async fn render<B>(
        &self,
        target: &B::Target,
        node: R::Node,
        builder: B,
    ) -> Result<Option<DispatchResult>>
    where
        B: JobBuilder,
    {
        let segments = match self.renderer.render(target, node).await? {
            Some(segments) if !segments.is_empty() => segments,
            _ => {
                debug!(uid = %target.uid(), "nothing rendered");
                return Ok(None);
            }
        };

        let jobs = builder.build(target, segments)?;
        self.dispatch_jobs(target, jobs).await.map(Some)
    }

    /// Reply (when a token is given) or push to one conversation.
    pub async fn render_chat(
        &self,
        thread: &ChatThread,
        node: R::Node,
        reply_token: Option<ReplyToken>,
    ) -> Result<Option<DispatchResult>> {
        let builder = match reply_token {
            Some(token) => ChatJobBuilder::new().with_reply_token(token),
            None => ChatJobBuilder::new(),
        };
        self.render(thread, node, builder).await
    }

    pub async fn render_multicast(
        &self,
        target: &MulticastTarget,
        node: R::Node,
    ) -> Result<Option<DispatchResult>> {
        self.render(target, node, MulticastJobBuilder::new()).await
    }

    /// Queue prebuilt jobs and wait for them, with the same error reporting as
    /// [`Dispatcher::render`].
    pub async fn dispatch_jobs(
        &self,
        target: &dyn DispatchTarget,
        jobs: Vec<Job>,
    ) -> Result<DispatchResult> {
        let submitted = jobs.len();
        let result = self.queue.execute_jobs(jobs).await?;

        result.into_result().map_err(|err| {
            warn!(
                uid = %target.uid(),
                platform = target.platform(),
                failed = err.errors().len(),
                submitted,
                "dispatch finished with errors"
            );
            Error::Dispatch(err)
        })
    }

    /// One raw API call outside any conversation's ordering.
    ///
    /// Failures come back as the specific [`Error::Api`] or [`Error::Transport`].
    pub async fn request_api(
        &self,
        method: Method,
        path: impl Into<String>,
        payload: Option<Value>,
        auth_override: Option<String>,
    ) -> Result<Value> {
        let mut job = Job::new(method, path);
        if let Some(payload) = payload {
            job = job.with_payload(payload);
        }
        if let Some(token) = auth_override {
            job = job.with_auth_override(token);
        }

        let result = self.queue.execute_jobs(vec![job]).await?;
        let response = result
            .batch
            .into_iter()
            .next()
            .ok_or_else(|| Error::from(JobError::Abandoned))?;
        response.result.map_err(Error::from)
    }

    pub async fn snapshot(&self) -> WorkerSnapshot {
        self.worker.snapshot().await
    }

    /// Stop the worker. Jobs in flight still settle; queued jobs stay queued.
    pub fn shutdown(&self) -> bool {
        self.worker.stop()
    }
}
