//! Per-job outcomes and the aggregate result of one submission.

use super::job::Job;
use crate::error::DispatchError;
use crate::line::ApiError;
use crate::transport::TransportError;
use serde_json::Value;
use thiserror::Error;

/// Why a single job failed.
///
/// Cloneable so the same failure can be reported to the submitter and to the
/// caller of [`crate::queue::JobQueue::acquire_at`].
#[derive(Debug, Clone, Error)]
pub enum JobError {
    /// The platform answered with a non-success status.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The request never got a usable answer.
    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    /// The executor handed to `acquire_at` failed as a whole.
    #[error("Job executor failed: {0}")]
    Executor(String),

    /// The job left the queue but its execution panicked or was dropped before settling.
    #[error("Job was dropped before it settled")]
    Abandoned,
}

impl JobError {
    pub fn is_api(&self) -> bool {
        matches!(self, JobError::Api(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, JobError::Transport(_))
    }

    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            JobError::Api(err) => Some(err),
            _ => None,
        }
    }
}

/// Outcome of one job.
#[derive(Debug, Clone)]
pub struct JobResponse {
    pub job: Job,
    pub result: std::result::Result<Value, JobError>,
}

impl JobResponse {
    pub fn new(job: Job, result: std::result::Result<Value, JobError>) -> Self {
        Self { job, result }
    }

    pub fn success(job: Job, value: Value) -> Self {
        Self::new(job, Ok(value))
    }

    pub fn failure(job: Job, error: JobError) -> Self {
        Self::new(job, Err(error))
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn value(&self) -> Option<&Value> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&JobError> {
        self.result.as_ref().err()
    }
}

/// Result of one `execute_jobs` call.
///
/// `batch[i]` always answers the i-th submitted job, whatever order the
/// jobs completed in. `errors` is `None` when every job succeeded.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub success: bool,
    pub batch: Vec<JobResponse>,
    pub errors: Option<Vec<JobError>>,
}

impl DispatchResult {
    pub fn from_batch(batch: Vec<JobResponse>) -> Self {
        let errors: Vec<JobError> = batch.iter().filter_map(|r| r.error().cloned()).collect();
        let success = errors.is_empty();
        Self {
            success,
            batch,
            errors: if success { None } else { Some(errors) },
        }
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Successful values, index-aligned with the batch.
    pub fn values(&self) -> Vec<Option<&Value>> {
        self.batch.iter().map(JobResponse::value).collect()
    }

    /// Turn a result with failures into the aggregate error.
    pub fn into_result(self) -> std::result::Result<Self, DispatchError> {
        if self.success {
            Ok(self)
        } else {
            Err(DispatchError::new(self))
        }
    }
}
