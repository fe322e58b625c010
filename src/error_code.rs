//! 平台错误分类：按 HTTP 状态码划分 API 错误及其重试语义。
//!
//! Classification of platform API failures by HTTP status.
//!
//! Messaging platforms report failures mostly through the status code, with a
//! free-form message in the body. [`ApiErrorClass`] gives those statuses a
//! stable name for logging and for callers deciding whether a failed job is
//! worth re-submitting. The dispatch worker itself never retries.
//!
//! | Status    | Class               | Retryable |
//! |-----------|---------------------|-----------|
//! | 400       | `invalid_request`   | no        |
//! | 401       | `authentication`    | no        |
//! | 403       | `permission_denied` | no        |
//! | 404       | `not_found`         | no        |
//! | 409       | `conflict`          | yes       |
//! | 413       | `request_too_large` | no        |
//! | 429       | `rate_limited`      | yes       |
//! | 5xx       | `server_error`      | yes       |
//!
//! ## Example
//!
//! ```rust
//! use chat_dispatch::error_code::ApiErrorClass;
//!
//! let class = ApiErrorClass::from_http_status(429);
//! assert_eq!(class.name(), "rate_limited");
//! assert!(class.retryable());
//! ```

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorClass {
    /// Malformed request, invalid message object or unknown field
    InvalidRequest,
    /// Invalid or expired channel access token
    Authentication,
    /// Token valid but the channel lacks the permission (e.g. plan limits)
    PermissionDenied,
    /// User, group or rich menu does not exist
    NotFound,
    /// Same retry key already accepted
    Conflict,
    /// Payload exceeds the platform's size limit
    RequestTooLarge,
    /// Rate limit or monthly quota exceeded
    RateLimited,
    /// Platform-side failure
    ServerError,
    /// Status could not be classified
    Unknown,
}

impl ApiErrorClass {
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 => Self::InvalidRequest,
            401 => Self::Authentication,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            409 => Self::Conflict,
            413 => Self::RequestTooLarge,
            429 => Self::RateLimited,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::Authentication => "authentication",
            Self::PermissionDenied => "permission_denied",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::RequestTooLarge => "request_too_large",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::Unknown => "unknown",
        }
    }

    /// Whether re-submitting the same job later may succeed.
    #[inline]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::ServerError | Self::Conflict)
    }
}

impl fmt::Display for ApiErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
