use super::config::DispatchConfig;
use super::core::Dispatcher;
use super::render::Renderer;
use crate::queue::JobQueue;
use crate::resilience::rate_limiter::RateLimiter;
use crate::transport::HttpAgent;
use crate::worker::{JobAgent, Worker};
use crate::Result;
use std::sync::Arc;
use tracing::info;

/// Assembles queue, agent, worker and renderer into a [`Dispatcher`].
///
/// Without an explicit agent an [`HttpAgent`] is built from the config.
pub struct DispatcherBuilder {
    config: DispatchConfig,
    agent: Option<Arc<dyn JobAgent>>,
    channel_tokens: Vec<(String, String)>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            config: DispatchConfig::default(),
            agent: None,
            channel_tokens: Vec::new(),
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new().with_config(DispatchConfig::from_env()?))
    }

    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Replace the HTTP agent, e.g. with a stub in tests.
    pub fn with_agent(mut self, agent: Arc<dyn JobAgent>) -> Self {
        self.agent = Some(agent);
        self
    }

    /// Token for jobs routed to `channel_id`. Only used by the built-in HTTP agent.
    pub fn with_channel_token(
        mut self,
        channel_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        self.channel_tokens.push((channel_id.into(), token.into()));
        self
    }

    /// Validate the config and start a dispatcher.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime, see [`Worker::start`].
    pub fn build<R: Renderer>(self, renderer: R) -> Result<Dispatcher<R>> {
        self.config.validate()?;

        let agent: Arc<dyn JobAgent> = match self.agent {
            Some(agent) => agent,
            None => {
                let mut http = HttpAgent::from_config(&self.config)?;
                for (channel_id, token) in self.channel_tokens {
                    http = http.with_channel_token(channel_id, token);
                }
                Arc::new(http)
            }
        };

        let queue = match self.config.max_pending {
            Some(limit) => JobQueue::new().with_max_pending(limit),
            None => JobQueue::new(),
        };

        let rate_limiter = self
            .config
            .rate_limiter_config()
            .map(|cfg| Arc::new(RateLimiter::new(cfg)));

        info!(
            api_base = %self.config.api_base,
            max_connections = self.config.max_connections,
            max_pending = self.config.max_pending,
            rate_limited = rate_limiter.is_some(),
            "building dispatcher"
        );

        let worker = Worker::with_rate_limiter(agent, self.config.worker_config(), rate_limiter);
        Ok(Dispatcher::new(Arc::new(queue), worker, renderer))
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
