use super::action::{ApiRequest, ChatAction};
use super::api::{self, MAX_MESSAGES_PER_REQUEST, MAX_MULTICAST_RECIPIENTS, RETRY_KEY_HEADER};
use super::thread::{ChatThread, MulticastTarget, ReplyToken};
use crate::builder::{
    json_type_name, text_message, BuildError, JobBuilder, MessageBuffer, Segment, SegmentValue,
};
use crate::dispatcher::DispatchTarget;
use crate::queue::{ExecutionKey, Job};
use serde_json::{json, Value};
use uuid::Uuid;

/// Builds reply/push jobs for one conversation.
///
/// If a reply token is given, the first message job uses the reply endpoint
/// and consumes the token; every later job is a push.
#[derive(Debug, Default)]
pub struct ChatJobBuilder {
    reply_token: Option<ReplyToken>,
}

impl ChatJobBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply_token(mut self, token: ReplyToken) -> Self {
        self.reply_token = Some(token);
        self
    }

    pub fn has_reply_token(&self) -> bool {
        self.reply_token.is_some()
    }
}

impl JobBuilder for ChatJobBuilder {
    type Target = ChatThread;

    fn build(self, thread: &ChatThread, segments: Vec<Segment>) -> Result<Vec<Job>, BuildError> {
        let key = thread.execution_key();
        let mut reply_token = self.reply_token;

        fold_segments(
            segments,
            |messages| {
                let job = match reply_token.take() {
                    Some(token) => Job::post(
                        api::REPLY_PATH,
                        json!({ "replyToken": token.as_str(), "messages": messages }),
                    ),
                    None => Job::post(
                        api::PUSH_PATH,
                        json!({ "to": thread.id(), "messages": messages }),
                    )
                    .with_header(RETRY_KEY_HEADER, Uuid::new_v4().to_string()),
                };
                address(job, &key, thread.channel_id())
            },
            |node, action| {
                let request = action.chat_request(thread).ok_or_else(|| BuildError::NoRequest {
                    node: node.to_string(),
                    action: action.name(),
                    target: format!("{} ({} chat)", thread.uid(), thread.kind().name()),
                })?;
                Ok(address(request_job(request), &key, thread.channel_id()))
            },
        )
    }
}

/// Builds multicast jobs for a fixed recipient list.
///
/// All multicast jobs share [`api::MULTICAST_EXECUTION_KEY`], so multicast
/// calls never overlap one another, while per-thread traffic keeps running
/// in parallel.
#[derive(Debug, Default)]
pub struct MulticastJobBuilder;

impl MulticastJobBuilder {
    pub fn new() -> Self {
        Self
    }
}

impl JobBuilder for MulticastJobBuilder {
    type Target = MulticastTarget;

    fn build(
        self,
        target: &MulticastTarget,
        segments: Vec<Segment>,
    ) -> Result<Vec<Job>, BuildError> {
        let recipients = target.user_ids().len();
        if recipients == 0 || recipients > MAX_MULTICAST_RECIPIENTS {
            return Err(BuildError::InvalidTarget {
                target: target.uid(),
                reason: format!(
                    "multicast needs 1 to {} recipients, got {}",
                    MAX_MULTICAST_RECIPIENTS, recipients
                ),
            });
        }

        let key = target.execution_key();
        fold_segments(
            segments,
            |messages| {
                let job = Job::post(
                    api::MULTICAST_PATH,
                    json!({ "to": target.user_ids(), "messages": messages }),
                )
                .with_header(RETRY_KEY_HEADER, Uuid::new_v4().to_string());
                address(job, &key, target.channel_id())
            },
            |node, action| {
                let request = action
                    .multicast_request(target)
                    .ok_or_else(|| BuildError::NoRequest {
                        node: node.to_string(),
                        action: action.name(),
                        target: target.uid(),
                    })?;
                Ok(address(request_job(request), &key, target.channel_id()))
            },
        )
    }
}

fn fold_segments<M, A>(
    segments: Vec<Segment>,
    mut messages_job: M,
    mut action_job: A,
) -> Result<Vec<Job>, BuildError>
where
    M: FnMut(Vec<Value>) -> Job,
    A: FnMut(&str, &ChatAction) -> Result<Job, BuildError>,
{
    let mut buffer = MessageBuffer::new(MAX_MESSAGES_PER_REQUEST);
    let mut jobs = Vec::new();

    for Segment { node, value } in segments {
        match value {
            SegmentValue::Text(text) => {
                if buffer.push(text_message(&text)).should_flush() {
                    jobs.push(messages_job(buffer.drain()));
                }
            }
            SegmentValue::Message(message) => {
                if !message.is_object() {
                    return Err(BuildError::InvalidMessage {
                        node,
                        found: json_type_name(&message),
                    });
                }
                if buffer.push(message).should_flush() {
                    jobs.push(messages_job(buffer.drain()));
                }
            }
            SegmentValue::Part(_) => return Err(BuildError::UnresolvedPart { node }),
            SegmentValue::Action(action) => {
                if !buffer.is_empty() {
                    jobs.push(messages_job(buffer.drain()));
                }
                jobs.push(action_job(&node, &action)?);
            }
        }
    }

    if !buffer.is_empty() {
        jobs.push(messages_job(buffer.drain()));
    }
    Ok(jobs)
}

fn request_job(request: ApiRequest) -> Job {
    let job = Job::new(request.method, request.path);
    match request.payload {
        Some(payload) => job.with_payload(payload),
        None => job,
    }
}

fn address(job: Job, key: &ExecutionKey, channel_id: &str) -> Job {
    job.with_execution_key(key.clone())
        .with_routing_hint(channel_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(n: usize) -> Vec<Segment> {
        (0..n).map(|i| Segment::text("p", format!("#{}", i))).collect()
    }

    fn message_count(job: &Job) -> usize {
        job.payload()
            .and_then(|p| p.get("messages"))
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0)
    }

    #[test]
    fn test_push_payload_shape() {
        let thread = ChatThread::user("1656", "U1");
        let jobs = ChatJobBuilder::new().build(&thread, texts(1)).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].path(), api::PUSH_PATH);
        assert_eq!(
            jobs[0].payload(),
            Some(&json!({ "to": "U1", "messages": [{ "type": "text", "text": "#0" }] }))
        );
        assert_eq!(jobs[0].routing_hint(), Some("1656"));
        assert!(jobs[0]
            .headers()
            .iter()
            .any(|(name, _)| name == RETRY_KEY_HEADER));
    }

    #[test]
    fn test_reply_payload_has_no_retry_key() {
        let thread = ChatThread::user("1656", "U1");
        let jobs = ChatJobBuilder::new()
            .with_reply_token(ReplyToken::new("token-1"))
            .build(&thread, texts(2))
            .unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].path(), api::REPLY_PATH);
        assert_eq!(
            jobs[0].payload().and_then(|p| p.get("replyToken")),
            Some(&json!("token-1"))
        );
        assert_eq!(message_count(&jobs[0]), 2);
        assert!(jobs[0].headers().is_empty());
    }

    #[test]
    fn test_exactly_five_messages_make_one_job() {
        let thread = ChatThread::user("1656", "U1");
        let jobs = ChatJobBuilder::new().build(&thread, texts(5)).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(message_count(&jobs[0]), 5);
    }

    #[test]
    fn test_non_object_message_fails_with_node_name() {
        let thread = ChatThread::user("1656", "U1");
        let err = ChatJobBuilder::new()
            .build(&thread, vec![Segment::message("Sticker", json!("oops"))])
            .unwrap_err();
        assert_eq!(
            err,
            BuildError::InvalidMessage {
                node: "Sticker".into(),
                found: "string"
            }
        );
        assert_eq!(err.node(), Some("Sticker"));
    }

    #[test]
    fn test_unresolved_part_fails() {
        let thread = ChatThread::user("1656", "U1");
        let err = ChatJobBuilder::new()
            .build(&thread, vec![Segment::part("QuickReply", json!({}))])
            .unwrap_err();
        assert!(matches!(err, BuildError::UnresolvedPart { ref node } if node == "QuickReply"));
    }

    #[test]
    fn test_multicast_recipient_bounds() {
        let empty = MulticastTarget::new("1656", Vec::<String>::new());
        let err = MulticastJobBuilder::new()
            .build(&empty, texts(1))
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidTarget { .. }));

        let crowd = MulticastTarget::new("1656", (0..501).map(|i| format!("U{}", i)));
        assert!(MulticastJobBuilder::new().build(&crowd, texts(1)).is_err());
    }
}
