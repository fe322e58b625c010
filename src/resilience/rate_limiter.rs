use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RateLimiterSnapshot {
    pub rps: f64,
    pub burst: f64,
    pub tokens: f64,
    /// Estimated wait until the next call may start (ms), if one would wait now.
    pub estimated_wait_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiterConfig {
    /// Calls per second. Zero disables the bucket; `block_for` still applies.
    pub rps: f64,
    /// Calls allowed back to back after an idle period.
    pub burst: f64,
}

impl RateLimiterConfig {
    pub fn from_rps(rps: f64) -> Option<Self> {
        if !rps.is_finite() || rps < 0.0 {
            return None;
        }
        Some(Self {
            rps,
            burst: rps.max(1.0),
        })
    }

    /// LINE quotas are usually quoted per minute.
    pub fn from_rpm(rpm: f64) -> Option<Self> {
        Self::from_rps(rpm / 60.0)
    }

    pub fn with_burst(mut self, burst: u32) -> Self {
        self.burst = f64::from(burst.max(1));
        self
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last: Instant,
    /// Set from a Retry-After answer; no call starts before it.
    blocked_until: Option<Instant>,
}

/// Token bucket in front of outbound API calls.
///
/// Opt-in. A worker without a limiter starts calls as soon as a connection
/// slot and the execution key are free.
pub struct RateLimiter {
    cfg: RateLimiterConfig,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(cfg: RateLimiterConfig) -> Self {
        let bucket = Mutex::new(Bucket {
            tokens: cfg.burst,
            last: Instant::now(),
            blocked_until: None,
        });
        Self { cfg, bucket }
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.cfg
    }

    fn refill(cfg: &RateLimiterConfig, bucket: &mut Bucket, now: Instant) {
        let elapsed = now.duration_since(bucket.last).as_secs_f64();
        if elapsed > 0.0 {
            bucket.tokens = (bucket.tokens + elapsed * cfg.rps).min(cfg.burst);
            bucket.last = now;
        }
    }

    /// Wait until one call may start, then take its token.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                let now = Instant::now();
                match bucket.blocked_until {
                    Some(until) if until > now => until - now,
                    _ => {
                        bucket.blocked_until = None;
                        if self.cfg.rps <= 0.0 {
                            return;
                        }
                        Self::refill(&self.cfg, &mut bucket, now);
                        if bucket.tokens >= 1.0 {
                            bucket.tokens -= 1.0;
                            return;
                        }
                        Duration::from_secs_f64((1.0 - bucket.tokens) / self.cfg.rps)
                    }
                }
            };
            tokio::time::sleep(wait).await;
        }
    }

    /// Take a token if one is available right now.
    pub async fn try_acquire(&self) -> bool {
        let mut bucket = self.bucket.lock().await;
        let now = Instant::now();
        if matches!(bucket.blocked_until, Some(until) if until > now) {
            return false;
        }
        if self.cfg.rps <= 0.0 {
            return true;
        }
        Self::refill(&self.cfg, &mut bucket, now);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Hold every call back for `delay`, e.g. after a 429 with Retry-After.
    /// A shorter block never cuts an existing longer one.
    pub async fn block_for(&self, delay: Duration) {
        let until = Instant::now() + delay;
        let mut bucket = self.bucket.lock().await;
        if bucket.blocked_until.map_or(true, |current| current < until) {
            bucket.blocked_until = Some(until);
            debug!(delay_ms = delay.as_millis() as u64, "outbound calls blocked");
        }
    }

    pub async fn snapshot(&self) -> RateLimiterSnapshot {
        let mut bucket = self.bucket.lock().await;
        let now = Instant::now();

        let mut wait_ms = bucket
            .blocked_until
            .filter(|until| *until > now)
            .map(|until| (until - now).as_millis() as u64);

        if self.cfg.rps > 0.0 {
            Self::refill(&self.cfg, &mut bucket, now);
            if bucket.tokens < 1.0 {
                let local = ((1.0 - bucket.tokens) / self.cfg.rps * 1000.0) as u64;
                wait_ms = Some(wait_ms.unwrap_or(0).max(local));
            }
        }

        RateLimiterSnapshot {
            rps: self.cfg.rps,
            burst: self.cfg.burst,
            tokens: bucket.tokens,
            estimated_wait_ms: wait_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_rps() {
        let config = RateLimiterConfig::from_rps(10.0).unwrap();
        assert_eq!(config.rps, 10.0);
        assert_eq!(config.burst, 10.0);

        // burst never drops below one call
        assert_eq!(RateLimiterConfig::from_rps(0.5).unwrap().burst, 1.0);

        assert!(RateLimiterConfig::from_rps(-1.0).is_none());
        assert!(RateLimiterConfig::from_rps(f64::NAN).is_none());
        assert!(RateLimiterConfig::from_rps(f64::INFINITY).is_none());
    }

    #[test]
    fn test_config_from_rpm() {
        let config = RateLimiterConfig::from_rpm(600.0).unwrap().with_burst(3);
        assert_eq!(config.rps, 10.0);
        assert_eq!(config.burst, 3.0);
    }

    #[tokio::test]
    async fn test_burst_then_empty() {
        let limiter = RateLimiter::new(RateLimiterConfig::from_rps(1.0).unwrap().with_burst(3));
        assert!(limiter.try_acquire().await);
        assert!(limiter.try_acquire().await);
        assert!(limiter.try_acquire().await);
        assert!(!limiter.try_acquire().await);

        let snapshot = limiter.snapshot().await;
        assert!(snapshot.estimated_wait_ms.is_some());
    }

    #[tokio::test]
    async fn test_zero_rps_never_waits() {
        let limiter = RateLimiter::new(RateLimiterConfig::from_rps(0.0).unwrap());
        for _ in 0..50 {
            limiter.acquire().await;
        }
        assert!(limiter.try_acquire().await);
    }

    #[tokio::test]
    async fn test_refill() {
        let limiter = RateLimiter::new(RateLimiterConfig::from_rps(100.0).unwrap().with_burst(2));
        assert!(limiter.try_acquire().await);
        assert!(limiter.try_acquire().await);
        assert!(!limiter.try_acquire().await);

        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(limiter.try_acquire().await);
    }

    #[tokio::test]
    async fn test_block_for_holds_calls_back() {
        let limiter = RateLimiter::new(RateLimiterConfig::from_rps(0.0).unwrap());
        limiter.block_for(Duration::from_millis(40)).await;
        assert!(!limiter.try_acquire().await);
        assert!(limiter.snapshot().await.estimated_wait_ms.is_some());

        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert!(limiter.try_acquire().await);
    }

    #[tokio::test]
    async fn test_shorter_block_keeps_longer_one() {
        let limiter = RateLimiter::new(RateLimiterConfig::from_rps(0.0).unwrap());
        limiter.block_for(Duration::from_millis(200)).await;
        limiter.block_for(Duration::from_millis(1)).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!limiter.try_acquire().await);
    }
}
