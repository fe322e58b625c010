use crate::error_code::ApiErrorClass;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One entry of the `details` array in an error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    #[serde(default)]
    details: Vec<ApiErrorDetail>,
}

/// The platform answered with a non-success status.
#[derive(Debug, Clone, Error)]
#[error("LINE API error: HTTP {status} ({class}): {message}{}", format_details(.details))]
pub struct ApiError {
    pub status: u16,
    pub class: ApiErrorClass,
    pub message: String,
    pub details: Vec<ApiErrorDetail>,
    /// `X-Line-Request-Id` of the failed call.
    pub request_id: Option<String>,
    /// Parsed `Retry-After`, only sent with 429 responses.
    pub retry_after_ms: Option<u64>,
    /// Raw body; `Value::Null` when empty, a string when not JSON.
    pub body: Value,
}

fn format_details(details: &[ApiErrorDetail]) -> String {
    if details.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = details
        .iter()
        .map(|d| match &d.property {
            Some(property) => format!("{}: {}", property, d.message),
            None => d.message.clone(),
        })
        .collect();
    format!(" [{}]", parts.join("; "))
}

impl ApiError {
    /// Build from a failed response's status and body text.
    pub fn from_response(status: u16, body: &str) -> Self {
        let class = ApiErrorClass::from_http_status(status);
        let trimmed = body.trim();

        let (message, details, body) = if trimmed.is_empty() {
            (None, Vec::new(), Value::Null)
        } else {
            match serde_json::from_str::<Value>(trimmed) {
                Ok(json) => {
                    let parsed = serde_json::from_value::<ErrorBody>(json.clone()).ok();
                    match parsed {
                        Some(ErrorBody { message, details }) => (message, details, json),
                        None => (None, Vec::new(), json),
                    }
                }
                Err(_) => (
                    Some(trimmed.to_string()),
                    Vec::new(),
                    Value::String(trimmed.to_string()),
                ),
            }
        };

        let message = message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| fallback_message(status));

        Self {
            status,
            class,
            message,
            details,
            request_id: None,
            retry_after_ms: None,
            body,
        }
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn with_retry_after_ms(mut self, retry_after_ms: Option<u64>) -> Self {
        self.retry_after_ms = retry_after_ms;
        self
    }

    pub fn retryable(&self) -> bool {
        self.class.retryable()
    }
}

fn fallback_message(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_message_and_details() {
        let body = r#"{
            "message": "The request body has 2 error(s)",
            "details": [
                {"message": "May not be empty", "property": "messages[0].text"},
                {"message": "Must be one of the following values: [text, image]", "property": "messages[1].type"}
            ]
        }"#;
        let err = ApiError::from_response(400, body);
        assert_eq!(err.status, 400);
        assert_eq!(err.class, ApiErrorClass::InvalidRequest);
        assert_eq!(err.message, "The request body has 2 error(s)");
        assert_eq!(err.details.len(), 2);
        assert_eq!(err.details[0].property.as_deref(), Some("messages[0].text"));
        assert!(err.to_string().contains("messages[0].text: May not be empty"));
        assert!(!err.retryable());
    }

    #[test]
    fn test_empty_body_uses_reason_phrase() {
        let err = ApiError::from_response(404, "");
        assert_eq!(err.message, "Not Found");
        assert_eq!(err.body, Value::Null);
        assert!(err.details.is_empty());
    }

    #[test]
    fn test_plain_text_body() {
        let err = ApiError::from_response(502, "Bad Gateway from upstream");
        assert_eq!(err.message, "Bad Gateway from upstream");
        assert_eq!(err.body, json!("Bad Gateway from upstream"));
        assert!(err.retryable());
    }

    #[test]
    fn test_rate_limit_metadata() {
        let err = ApiError::from_response(429, r#"{"message":"The API rate limit has been exceeded."}"#)
            .with_retry_after_ms(Some(2_000))
            .with_request_id(Some("req-1".into()));
        assert_eq!(err.class, ApiErrorClass::RateLimited);
        assert_eq!(err.retry_after_ms, Some(2_000));
        assert_eq!(err.request_id.as_deref(), Some("req-1"));
    }
}
