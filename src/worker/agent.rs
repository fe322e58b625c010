use crate::queue::{Job, JobError};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Executes one job against the remote platform.
///
/// One job is one request. Implementations return the parsed response body
/// (`Value::Null` for an empty body) or the typed failure.
#[async_trait]
pub trait JobAgent: Send + Sync {
    async fn execute(&self, job: &Job) -> Result<Value, JobError>;
}

#[async_trait]
impl<A: JobAgent + ?Sized> JobAgent for Arc<A> {
    async fn execute(&self, job: &Job) -> Result<Value, JobError> {
        (**self).execute(job).await
    }
}
