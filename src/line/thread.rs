use super::api::MULTICAST_EXECUTION_KEY;
use crate::dispatcher::DispatchTarget;
use crate::queue::ExecutionKey;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    User,
    Group,
    Room,
}

impl ChatKind {
    pub fn name(&self) -> &'static str {
        match self {
            ChatKind::User => "user",
            ChatKind::Group => "group",
            ChatKind::Room => "room",
        }
    }
}

/// One conversation on one channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatThread {
    channel_id: String,
    kind: ChatKind,
    id: String,
}

impl ChatThread {
    pub fn new(channel_id: impl Into<String>, kind: ChatKind, id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            kind,
            id: id.into(),
        }
    }

    pub fn user(channel_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::new(channel_id, ChatKind::User, user_id)
    }

    pub fn group(channel_id: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self::new(channel_id, ChatKind::Group, group_id)
    }

    pub fn room(channel_id: impl Into<String>, room_id: impl Into<String>) -> Self {
        Self::new(channel_id, ChatKind::Room, room_id)
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn kind(&self) -> ChatKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Every job rendered for this thread runs under this key.
    pub fn execution_key(&self) -> ExecutionKey {
        ExecutionKey::new(self.uid())
    }
}

impl DispatchTarget for ChatThread {
    fn platform(&self) -> &'static str {
        "line"
    }

    fn uid(&self) -> String {
        format!("line.{}.{}", self.channel_id, self.id)
    }
}

/// A fixed list of users addressed by one multicast call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MulticastTarget {
    channel_id: String,
    user_ids: Vec<String>,
}

impl MulticastTarget {
    pub fn new<I, S>(channel_id: impl Into<String>, user_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channel_id: channel_id.into(),
            user_ids: user_ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn user_ids(&self) -> &[String] {
        &self.user_ids
    }

    /// Multicast calls are serialized process-wide, whatever the recipients.
    pub fn execution_key(&self) -> ExecutionKey {
        ExecutionKey::new(MULTICAST_EXECUTION_KEY)
    }
}

impl DispatchTarget for MulticastTarget {
    fn platform(&self) -> &'static str {
        "line"
    }

    fn uid(&self) -> String {
        format!("line.{}.multicast", self.channel_id)
    }
}

/// One-time token for answering a webhook event with the reply endpoint.
///
/// Not `Clone`: a token is moved into the builder of one dispatch
/// and consumed by its first message job.
#[derive(PartialEq, Eq)]
pub struct ReplyToken(String);

impl ReplyToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ReplyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ReplyToken(..)")
    }
}
