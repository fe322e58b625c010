//! Job and execution key.

use reqwest::Method;
use serde_json::Value;
use std::fmt;

/// Grouping token for jobs that must run one at a time, in submission order.
///
/// Typically one per conversation thread, or one constant value shared by all
/// multicast traffic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExecutionKey(String);

impl ExecutionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExecutionKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ExecutionKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// One outbound API call.
///
/// Built with the `with_*` setters and never mutated after it is submitted;
/// the queue owns it until the worker executes it.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    method: Method,
    path: String,
    payload: Option<Value>,
    execution_key: Option<ExecutionKey>,
    routing_hint: Option<String>,
    auth_override: Option<String>,
    headers: Vec<(String, String)>,
}

impl Job {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            payload: None,
            execution_key: None,
            routing_hint: None,
            auth_override: None,
            headers: Vec::new(),
        }
    }

    pub fn post(path: impl Into<String>, payload: Value) -> Self {
        Self::new(Method::POST, path).with_payload(payload)
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_execution_key(mut self, key: impl Into<ExecutionKey>) -> Self {
        self.execution_key = Some(key.into());
        self
    }

    /// Hint for the agent, e.g. which channel's credentials to use.
    pub fn with_routing_hint(mut self, hint: impl Into<String>) -> Self {
        self.routing_hint = Some(hint.into());
        self
    }

    /// Credential that replaces the agent's configured token for this call only.
    pub fn with_auth_override(mut self, token: impl Into<String>) -> Self {
        self.auth_override = Some(token.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    pub fn execution_key(&self) -> Option<&ExecutionKey> {
        self.execution_key.as_ref()
    }

    pub fn routing_hint(&self) -> Option<&str> {
        self.routing_hint.as_deref()
    }

    pub fn auth_override(&self) -> Option<&str> {
        self.auth_override.as_deref()
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}
