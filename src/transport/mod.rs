//! Network transport for platform API calls.

pub(crate) mod http;

pub use http::HttpAgent;

use std::sync::Arc;
use std::time::Duration;

/// A call that never got a usable answer from the platform.
///
/// Cloneable so one failure can be handed to every party waiting on the job.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[source] Arc<reqwest::Error>),

    #[error("request timed out after {} ms", .0.as_millis())]
    Timeout(Duration),

    #[error("invalid request target: {0}")]
    InvalidTarget(String),

    #[error("Transport error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Http(Arc::new(err))
    }
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        match self {
            TransportError::Timeout(_) => true,
            TransportError::Http(err) => err.is_timeout(),
            TransportError::InvalidTarget(_) | TransportError::Other(_) => false,
        }
    }
}
