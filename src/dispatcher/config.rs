//! Dispatch configuration, from code, environment or YAML.

use crate::line::api::DEFAULT_API_BASE;
use crate::resilience::rate_limiter::RateLimiterConfig;
use crate::transport::http::ACCESS_TOKEN_ENV;
use crate::worker::{WorkerConfig, DEFAULT_MAX_CONNECTIONS};
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub api_base: String,
    pub channel_id: Option<String>,
    pub access_token: Option<String>,
    pub max_connections: usize,
    /// Pending-job bound for the queue; `None` is unbounded.
    pub max_pending: Option<usize>,
    pub http_timeout_secs: u64,
    pub call_timeout_ms: Option<u64>,
    /// Calls per second across the worker; `None` disables the limiter.
    pub rps: Option<f64>,
    pub proxy_url: Option<String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            channel_id: None,
            access_token: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_pending: None,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            call_timeout_ms: None,
            rps: None,
            proxy_url: None,
        }
    }
}

// Tokens stay out of logs.
impl fmt::Debug for DispatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchConfig")
            .field("api_base", &self.api_base)
            .field("channel_id", &self.channel_id)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("max_connections", &self.max_connections)
            .field("max_pending", &self.max_pending)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("call_timeout_ms", &self.call_timeout_ms)
            .field("rps", &self.rps)
            .field("proxy_url", &self.proxy_url)
            .finish()
    }
}

impl DispatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by whatever `CHAT_DISPATCH_*` / `LINE_*` variables are set.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(base) = env::var("CHAT_DISPATCH_API_BASE") {
            config.api_base = base;
        }
        config.channel_id = env::var("LINE_CHANNEL_ID").ok();
        config.access_token = env::var(ACCESS_TOKEN_ENV).ok();
        config.proxy_url = env::var("CHAT_DISPATCH_PROXY_URL").ok();

        if let Some(n) = env_parse::<usize>("CHAT_DISPATCH_MAX_CONNECTIONS")? {
            config.max_connections = n;
        }
        config.max_pending = env_parse("CHAT_DISPATCH_MAX_PENDING")?;
        if let Some(secs) = env_parse::<u64>("CHAT_DISPATCH_HTTP_TIMEOUT_SECS")? {
            config.http_timeout_secs = secs;
        }
        config.call_timeout_ms = env_parse("CHAT_DISPATCH_CALL_TIMEOUT_MS")?;
        config.rps = match env_parse::<f64>("CHAT_DISPATCH_RPS")? {
            Some(rps) => Some(rps),
            None => env_parse::<f64>("CHAT_DISPATCH_RPM")?.map(|rpm| rpm / 60.0),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text).map_err(|e| match e {
            Error::Yaml(err) => Error::configuration_with_context(
                err.to_string(),
                ErrorContext::new().with_source(path.display().to_string()),
            ),
            other => other,
        })
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    pub fn with_channel_id(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_max_connections(mut self, n: usize) -> Self {
        self.max_connections = n;
        self
    }

    pub fn with_max_pending(mut self, n: usize) -> Self {
        self.max_pending = Some(n);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_rps(mut self, rps: f64) -> Self {
        self.rps = Some(rps);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(invalid("max_connections", "must be at least 1"));
        }
        if self.max_pending == Some(0) {
            return Err(invalid("max_pending", "must be at least 1 when set"));
        }
        if self.http_timeout_secs == 0 {
            return Err(invalid("http_timeout_secs", "must be at least 1"));
        }
        if self.call_timeout_ms == Some(0) {
            return Err(invalid("call_timeout_ms", "must be at least 1 when set"));
        }
        if let Some(rps) = self.rps {
            if RateLimiterConfig::from_rps(rps).is_none() {
                return Err(invalid("rps", "must be a finite, non-negative number"));
            }
        }
        if url::Url::parse(&self.api_base).is_err() {
            return Err(invalid("api_base", "must be an absolute URL"));
        }
        Ok(())
    }

    pub fn worker_config(&self) -> WorkerConfig {
        let config = WorkerConfig::new().with_max_connections(self.max_connections);
        match self.call_timeout_ms {
            Some(ms) => config.with_call_timeout(Duration::from_millis(ms)),
            None => config,
        }
    }

    pub fn rate_limiter_config(&self) -> Option<RateLimiterConfig> {
        self.rps.and_then(RateLimiterConfig::from_rps)
    }
}

fn invalid(field: &str, details: &str) -> Error {
    Error::configuration_with_context(
        format!("invalid dispatch configuration: {}", field),
        ErrorContext::new()
            .with_field_path(field)
            .with_details(details),
    )
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            Error::configuration_with_context(
                format!("cannot parse {}", name),
                ErrorContext::new()
                    .with_field_path(name)
                    .with_details(format!("got {:?}", raw)),
            )
        }),
        Err(_) => Ok(None),
    }
}
