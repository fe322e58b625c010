//! # chat-dispatch
//!
//! 会话消息分发核心：将渲染后的对话界面转换为消息平台 API 调用，并在限流的远端服务上
//! 按会话保序、按连接数限流地执行。
//!
//! Dispatch core for chat bots: turns rendered conversational UI into calls
//! against a messaging platform API and runs them against a rate-limited
//! remote service.
//!
//! ## Guarantees
//!
//! - **Per-conversation ordering**: jobs sharing an [`ExecutionKey`] never
//!   overlap and run in submission order.
//! - **Bounded concurrency**: at most `max_connections` calls are in flight
//!   per worker.
//! - **Isolated failures**: a failed call is reported on its own job and
//!   never blocks unrelated work.
//! - **Batched sends**: consecutive messages share one request, up to the
//!   platform's per-request limit.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chat_dispatch::builder::Segment;
//! use chat_dispatch::dispatcher::{DispatchConfig, DispatcherBuilder, SegmentRenderer};
//! use chat_dispatch::line::{ChatThread, ReplyToken};
//!
//! #[tokio::main]
//! async fn main() -> chat_dispatch::Result<()> {
//!     let dispatcher = DispatcherBuilder::new()
//!         .with_config(DispatchConfig::from_env()?)
//!         .build(SegmentRenderer)?;
//!
//!     let thread = ChatThread::user("1656000000", "U4af4980629");
//!     let segments = vec![
//!         Segment::text("Greeting", "Hello!"),
//!         Segment::text("Greeting", "How can I help?"),
//!     ];
//!
//!     // One reply call carrying both messages.
//!     let token = ReplyToken::new("nHuyWiB7yP5Zw52FIkcQobQuGDXCTA");
//!     dispatcher.render_chat(&thread, segments, Some(token)).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`queue`] | Jobs, the shared pending queue, per-job responses |
//! | [`worker`] | Scheduler enforcing the connection cap and key ordering |
//! | [`builder`] | Segments and the segment-to-job folding |
//! | [`line`] | LINE targets, actions, builders and API errors |
//! | [`dispatcher`] | Render/build/queue entry point, config and assembly |
//! | [`transport`] | HTTP agent performing one request per job |
//! | [`resilience`] | Opt-in outbound rate limiting |
//! | [`error_code`] | Classification of API failures by status |

pub mod builder;
pub mod dispatcher;
pub mod error_code;
pub mod line;
pub mod queue;
pub mod resilience;
pub mod transport;
pub mod worker;

// Re-export main types for convenience
pub use dispatcher::{DispatchConfig, DispatchTarget, Dispatcher, DispatcherBuilder, Renderer};
pub use queue::{DispatchResult, ExecutionKey, Job, JobError, JobQueue, JobResponse};
pub use worker::{JobAgent, Worker, WorkerSnapshot};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{DispatchError, Error, ErrorContext};
