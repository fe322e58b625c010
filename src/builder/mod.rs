//! 任务构建模块：将渲染片段折叠为最少的 API 调用任务。
//!
//! Job builder: folds rendered segments into the minimal job sequence.
//!
//! Consecutive send segments are buffered and flushed as one batched job when
//! the buffer is full or the segment list ends. A non-send segment first
//! flushes the buffer, then becomes its own job through its action's request
//! conversion. A segment that cannot be turned into a request fails the whole
//! build, so nothing reaches the queue.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Segment`] | One unit of rendered output and the node it came from |
//! | [`MessageBuffer`] | Send buffer with a fixed capacity |
//! | [`JobBuilder`] | Strategy turning segments into jobs for one target type |
//! | [`BuildError`] | Why a segment could not be turned into a job |
//!
//! The platform builders live in [`crate::line`].

mod buffer;
mod segment;

pub use buffer::{BufferPush, MessageBuffer};
pub(crate) use segment::text_message;
pub use segment::{Segment, SegmentValue};

use crate::dispatcher::DispatchTarget;
use crate::queue::Job;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("<{node}>: action `{action}` has no request for target {target}")]
    NoRequest {
        node: String,
        action: &'static str,
        target: String,
    },

    #[error("<{node}>: message must be a JSON object, got {found}")]
    InvalidMessage { node: String, found: &'static str },

    #[error("<{node}>: part was not merged into a message before building jobs")]
    UnresolvedPart { node: String },

    #[error("invalid target {target}: {reason}")]
    InvalidTarget { target: String, reason: String },
}

impl BuildError {
    /// Name of the node that produced the offending segment, if any.
    pub fn node(&self) -> Option<&str> {
        match self {
            BuildError::NoRequest { node, .. }
            | BuildError::InvalidMessage { node, .. }
            | BuildError::UnresolvedPart { node } => Some(node),
            BuildError::InvalidTarget { .. } => None,
        }
    }
}

/// Turns the segments rendered for one target into jobs.
///
/// Consumed by one build so one-time state (such as a reply token) cannot be
/// reused by a later dispatch.
pub trait JobBuilder: Send {
    type Target: DispatchTarget;

    fn build(self, target: &Self::Target, segments: Vec<Segment>) -> Result<Vec<Job>, BuildError>;
}

pub(crate) fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
