use crate::queue::ExecutionKey;
use crate::resilience::rate_limiter::RateLimiterSnapshot;

/// Point-in-time view of a worker, facts only.
#[derive(Debug, Clone, Default)]
pub struct WorkerSnapshot {
    pub started: bool,
    pub max_connections: usize,
    pub connection_count: usize,
    /// Keys with a job in flight, sorted.
    pub locked_keys: Vec<ExecutionKey>,
    /// Jobs still waiting in the attached queue.
    pub pending: usize,
    pub rate_limiter: Option<RateLimiterSnapshot>,
}

impl WorkerSnapshot {
    pub fn available_connections(&self) -> usize {
        self.max_connections.saturating_sub(self.connection_count)
    }

    pub fn is_idle(&self) -> bool {
        self.connection_count == 0 && self.pending == 0
    }
}
