use super::TransportError;
use crate::dispatcher::DispatchConfig;
use crate::line::api::REQUEST_ID_HEADER;
use crate::line::ApiError;
use crate::queue::{Job, JobError};
use crate::worker::JobAgent;
use crate::Result;
use async_trait::async_trait;
use keyring::Entry;
use reqwest::header::RETRY_AFTER;
use reqwest::{Method, Proxy};
use serde_json::Value;
use std::collections::HashMap;
use std::env;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use url::Url;

pub(crate) const KEYRING_SERVICE: &str = "chat-dispatch";
pub(crate) const ACCESS_TOKEN_ENV: &str = "LINE_CHANNEL_ACCESS_TOKEN";

/// [`JobAgent`] that performs each job as one HTTPS request.
///
/// The job path is joined onto the configured API base. Credentials are
/// picked per job: the job's own override first, then the token registered
/// for its routing hint (the channel id), then the default token.
pub struct HttpAgent {
    client: reqwest::Client,
    api_base: Url,
    access_token: Option<String>,
    channel_tokens: HashMap<String, String>,
}

impl HttpAgent {
    pub fn from_config(config: &DispatchConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .pool_max_idle_per_host(config.max_connections)
            .pool_idle_timeout(Some(Duration::from_secs(90)));

        if let Some(proxy_url) = &config.proxy_url {
            match Proxy::all(proxy_url) {
                Ok(proxy) => builder = builder.proxy(proxy),
                Err(err) => warn!(proxy = %proxy_url, error = %err, "ignoring invalid proxy url"),
            }
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;

        let access_token = config.access_token.clone().or_else(|| {
            config
                .channel_id
                .as_deref()
                .and_then(Self::lookup_access_token)
        });
        if access_token.is_none() {
            warn!("no channel access token configured; requests will be unauthenticated");
        }

        Ok(Self {
            client,
            api_base: normalize_base(&config.api_base)?,
            access_token,
            channel_tokens: HashMap::new(),
        })
    }

    /// Use `token` for jobs routed to `channel_id`.
    pub fn with_channel_token(
        mut self,
        channel_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        self.channel_tokens.insert(channel_id.into(), token.into());
        self
    }

    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    pub fn has_access_token(&self) -> bool {
        self.access_token.is_some()
    }

    fn lookup_access_token(channel_id: &str) -> Option<String> {
        // 1. Keyring entry for the channel
        if let Ok(entry) = Entry::new(KEYRING_SERVICE, channel_id) {
            if let Ok(token) = entry.get_password() {
                return Some(token);
            }
        }

        // 2. Environment
        env::var(ACCESS_TOKEN_ENV).ok()
    }

    fn token_for<'a>(&'a self, job: &'a Job) -> Option<&'a str> {
        job.auth_override()
            .or_else(|| {
                job.routing_hint()
                    .and_then(|hint| self.channel_tokens.get(hint))
                    .map(String::as_str)
            })
            .or(self.access_token.as_deref())
    }

    fn url_for(&self, job: &Job) -> std::result::Result<Url, TransportError> {
        self.api_base
            .join(job.path().trim_start_matches('/'))
            .map_err(|e| TransportError::InvalidTarget(format!("{}: {}", job.path(), e)))
    }

    async fn send(&self, job: &Job) -> std::result::Result<Value, JobError> {
        let url = self.url_for(job)?;
        let mut request = self.client.request(job.method().clone(), url);

        if let Some(token) = self.token_for(job) {
            request = request.bearer_auth(token);
        }
        for (name, value) in job.headers() {
            request = request.header(name.as_str(), value.as_str());
        }
        match job.payload() {
            Some(payload) => request = request.json(payload),
            // LINE rejects bodiless POSTs without an explicit length.
            None if *job.method() == Method::POST => {
                request = request.header(reqwest::header::CONTENT_LENGTH, "0")
            }
            None => {}
        }

        let start = Instant::now();
        let response = request.send().await.map_err(TransportError::from)?;
        let status = response.status();
        let request_id = header_str(&response, REQUEST_ID_HEADER);
        let retry_after_ms = header_str(&response, RETRY_AFTER.as_str())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(|secs| secs.saturating_mul(1000));
        let body = response.text().await.map_err(TransportError::from)?;

        if !status.is_success() {
            let err = ApiError::from_response(status.as_u16(), &body)
                .with_request_id(request_id)
                .with_retry_after_ms(retry_after_ms);
            info!(
                http_status = status.as_u16(),
                error_class = err.class.name(),
                retryable = err.retryable(),
                path = job.path(),
                request_id = err.request_id.as_deref(),
                duration_ms = start.elapsed().as_millis() as u64,
                "platform request failed"
            );
            return Err(err.into());
        }

        Ok(parse_body(body))
    }
}

#[async_trait]
impl JobAgent for HttpAgent {
    async fn execute(&self, job: &Job) -> std::result::Result<Value, JobError> {
        self.send(job).await
    }
}

fn header_str(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn normalize_base(base: &str) -> std::result::Result<Url, TransportError> {
    let with_slash = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{}/", base)
    };
    Url::parse(&with_slash).map_err(|e| TransportError::InvalidTarget(format!("{}: {}", base, e)))
}

/// Empty bodies are `Null`; bodies that are not JSON come back as a string.
fn parse_body(body: String) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&body).unwrap_or(Value::String(body))
}
