//! Send buffer.

use serde_json::Value;

/// Accumulates consecutive send messages until a request is full.
#[derive(Debug, Clone)]
pub struct MessageBuffer {
    max_batch_size: usize,
    items: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferPush {
    Added { count: usize },
    ShouldFlush { count: usize },
}

impl BufferPush {
    pub fn should_flush(&self) -> bool {
        matches!(self, BufferPush::ShouldFlush { .. })
    }

    pub fn count(&self) -> usize {
        match self {
            BufferPush::Added { count } | BufferPush::ShouldFlush { count } => *count,
        }
    }
}

impl MessageBuffer {
    pub fn new(max_batch_size: usize) -> Self {
        let max_batch_size = max_batch_size.max(1);
        Self {
            max_batch_size,
            items: Vec::with_capacity(max_batch_size),
        }
    }

    pub fn push(&mut self, message: Value) -> BufferPush {
        self.items.push(message);
        let count = self.items.len();
        if count >= self.max_batch_size {
            BufferPush::ShouldFlush { count }
        } else {
            BufferPush::Added { count }
        }
    }

    pub fn drain(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.items)
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
