//! 弹性模块：为出站 API 调用提供可选的限流器。
//!
//! # Resilience
//!
//! Opt-in throughput control for outbound calls. The worker consults the
//! limiter before every call and feeds Retry-After answers back into it, so
//! a 429 from the platform pauses the whole worker instead of one job.
//!
//! ```rust
//! use chat_dispatch::resilience::rate_limiter::{RateLimiter, RateLimiterConfig};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = RateLimiterConfig::from_rpm(1200.0).unwrap().with_burst(20);
//! let limiter = RateLimiter::new(config);
//!
//! if limiter.try_acquire().await {
//!     // Start the call...
//! }
//! # }
//! ```

pub mod rate_limiter;
