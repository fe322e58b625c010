//! LINE 适配模块：会话目标、动作、错误解析与任务构建器。
//!
//! LINE Messaging API adapter.
//!
//! Addressing targets ([`ChatThread`], [`MulticastTarget`]), the closed set of
//! non-message actions ([`ChatAction`]), the job builders that fold rendered
//! segments into reply/push/multicast calls, and the platform's typed
//! [`ApiError`].
//!
//! | Call | Endpoint | Execution key |
//! |------|----------|---------------|
//! | reply (first message job, if a reply token was given) | `v2/bot/message/reply` | thread uid |
//! | push | `v2/bot/message/push` | thread uid |
//! | multicast | `v2/bot/message/multicast` | [`api::MULTICAST_EXECUTION_KEY`] |
//! | rich menu link/unlink | `v2/bot/user/{id}/richmenu[/{menu}]` | thread uid |
//! | bulk rich menu link/unlink | `v2/bot/richmenu/bulk/*` | [`api::MULTICAST_EXECUTION_KEY`] |
//! | leave | `v2/bot/{group,room}/{id}/leave` | thread uid |

pub mod api;
mod action;
mod error;
mod jobs;
mod thread;

pub use action::{ApiRequest, ChatAction};
pub use error::{ApiError, ApiErrorDetail};
pub use jobs::{ChatJobBuilder, MulticastJobBuilder};
pub use thread::{ChatKind, ChatThread, MulticastTarget, ReplyToken};
