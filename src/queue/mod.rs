//! 任务队列模块：提交方与调度器之间唯一的共享结构。
//!
//! Job queue: the one shared structure between submitters and the worker.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Job`] | One outbound API call (method, path, payload, execution key) |
//! | [`ExecutionKey`] | Grouping token serializing the jobs that share it |
//! | [`JobQueue`] | Ordered pending jobs with peek / acquire / submit |
//! | [`JobResponse`] | Outcome of one job |
//! | [`DispatchResult`] | Index-aligned outcomes of one submission |
//!
//! ## Example
//!
//! ```rust
//! use chat_dispatch::queue::{Job, JobQueue, JobResponse};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let queue = Arc::new(JobQueue::new());
//! let submitter = {
//!     let queue = Arc::clone(&queue);
//!     tokio::spawn(async move {
//!         queue
//!             .execute_jobs(vec![Job::post("v2/bot/message/push", json!({ "to": "U1" }))])
//!             .await
//!     })
//! };
//! while queue.is_empty() {
//!     tokio::task::yield_now().await;
//! }
//!
//! // A consumer takes the job out and answers it.
//! queue
//!     .acquire_at(0, 1, |jobs| async move {
//!         Ok(jobs.into_iter().map(|job| JobResponse::success(job, json!({}))).collect())
//!     })
//!     .await
//!     .unwrap();
//!
//! let result = submitter.await.unwrap().unwrap();
//! assert!(result.success);
//! # }
//! ```

mod job;
mod job_queue;
mod response;

pub(crate) use job_queue::lock;

pub use job::{ExecutionKey, Job};
pub use job_queue::{JobQueue, ListenerId};
pub use response::{DispatchResult, JobError, JobResponse};
