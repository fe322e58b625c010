use crate::builder::BuildError;
use crate::line::ApiError;
use crate::queue::{DispatchResult, JobError};
use crate::transport::TransportError;
use thiserror::Error;

/// Structured error context for configuration and render failures.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "max_connections", "segments[3]")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "config_loader", "renderer")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Unified error type for the dispatch runtime.
///
/// Job-level failures never surface here directly from the queue: they are
/// attached to each [`crate::queue::JobResponse`] and only bundled into
/// [`Error::Dispatch`] by the dispatcher.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Job build error: {0}")]
    Build(#[from] BuildError),

    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// A single job failed for a reason other than the API or the transport.
    #[error("{0}")]
    Job(JobError),

    #[error("Job queue is full: {pending} pending + {incoming} incoming exceeds limit {limit}")]
    QueueFull {
        pending: usize,
        incoming: usize,
        limit: usize,
    },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Render error: {message}{}", format_context(.context))]
    Render {
        message: String,
        context: ErrorContext,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn render_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Render {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } | Error::Render { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Per-job errors carried by an aggregate dispatch failure.
    pub fn job_errors(&self) -> &[JobError] {
        match self {
            Error::Dispatch(err) => err.errors(),
            _ => &[],
        }
    }
}

impl From<JobError> for Error {
    fn from(err: JobError) -> Self {
        match err {
            JobError::Api(api) => Error::Api(api),
            JobError::Transport(transport) => Error::Transport(transport),
            other => Error::Job(other),
        }
    }
}

/// Aggregate failure of one dispatch call.
///
/// Holds every per-job error in submission order plus the full
/// [`DispatchResult`], so callers that need the successful responses of a
/// partially failed batch can still reach them.
#[derive(Debug, Clone, Error)]
#[error("{} of {} dispatched jobs failed: {}", .errors.len(), .result.batch.len(), first_error(.errors))]
pub struct DispatchError {
    errors: Vec<JobError>,
    result: DispatchResult,
}

fn first_error(errors: &[JobError]) -> String {
    match errors {
        [] => "no error recorded".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{} (and {} more)", first, rest.len()),
    }
}

impl DispatchError {
    pub(crate) fn new(result: DispatchResult) -> Self {
        let errors = result.errors.clone().unwrap_or_default();
        Self { errors, result }
    }

    pub fn errors(&self) -> &[JobError] {
        &self.errors
    }

    pub fn result(&self) -> &DispatchResult {
        &self.result
    }

    pub fn into_result(self) -> DispatchResult {
        self.result
    }
}
