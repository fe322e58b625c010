use crate::builder::Segment;
use crate::Result;
use async_trait::async_trait;

/// Where rendered output goes: a conversation, a recipient list.
pub trait DispatchTarget: Send + Sync {
    /// Platform name, e.g. `"line"`.
    fn platform(&self) -> &'static str;

    /// Stable id of the target, unique across platforms and channels.
    fn uid(&self) -> String;
}

/// Turns an application UI node into platform segments.
///
/// Returning `Ok(None)` (or an empty list) means there is nothing to send.
#[async_trait]
pub trait Renderer: Send + Sync {
    type Node: Send + 'static;

    async fn render(
        &self,
        target: &dyn DispatchTarget,
        node: Self::Node,
    ) -> Result<Option<Vec<Segment>>>;
}

/// Renderer for callers that already hold segments.
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentRenderer;

#[async_trait]
impl Renderer for SegmentRenderer {
    type Node = Vec<Segment>;

    async fn render(
        &self,
        _target: &dyn DispatchTarget,
        node: Vec<Segment>,
    ) -> Result<Option<Vec<Segment>>> {
        Ok(Some(node))
    }
}
