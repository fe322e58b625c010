//! Rendered output handed to the job builders.

use crate::line::ChatAction;
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum SegmentValue {
    /// Plain text, sent as a text message.
    Text(String),
    /// A complete message object.
    Message(Value),
    /// A non-message API call.
    Action(ChatAction),
    /// A fragment meant to be merged into an ancestor message by the renderer.
    Part(Value),
}

/// One unit of rendered output plus the name of the node that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub node: String,
    pub value: SegmentValue,
}

impl Segment {
    pub fn new(node: impl Into<String>, value: SegmentValue) -> Self {
        Self {
            node: node.into(),
            value,
        }
    }

    pub fn text(node: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(node, SegmentValue::Text(text.into()))
    }

    pub fn message(node: impl Into<String>, message: Value) -> Self {
        Self::new(node, SegmentValue::Message(message))
    }

    pub fn action(node: impl Into<String>, action: ChatAction) -> Self {
        Self::new(node, SegmentValue::Action(action))
    }

    pub fn part(node: impl Into<String>, part: Value) -> Self {
        Self::new(node, SegmentValue::Part(part))
    }

    /// Whether the segment goes into a batched send.
    pub fn is_send(&self) -> bool {
        matches!(self.value, SegmentValue::Text(_) | SegmentValue::Message(_))
    }
}

pub(crate) fn text_message(text: &str) -> Value {
    json!({ "type": "text", "text": text })
}
