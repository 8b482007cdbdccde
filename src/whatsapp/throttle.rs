use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::time::Duration;

use crate::core::config::{ThrottleKind, WhatsAppConfig};

/// Paces sequential broadcast sends. `wait` is awaited before send `index`.
#[async_trait]
pub trait Throttle: Send + Sync {
    async fn wait(&self, index: usize);
}

/// Sleeps a fixed delay between sends; the first send goes out immediately.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Throttle for FixedDelay {
    async fn wait(&self, index: usize) {
        if index > 0 && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

/// Token-bucket pacing via governor, for APIs that publish a per-second quota.
pub struct QuotaThrottle {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl std::fmt::Debug for QuotaThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaThrottle").finish_non_exhaustive()
    }
}

impl QuotaThrottle {
    pub fn per_second(messages: NonZeroU32) -> Self {
        Self {
            limiter: RateLimiter::direct(Quota::per_second(messages)),
        }
    }

    /// One message per `interval`, no burst.
    pub fn with_interval(interval: Duration) -> Option<Self> {
        Quota::with_period(interval).map(|quota| Self {
            limiter: RateLimiter::direct(quota),
        })
    }
}

#[async_trait]
impl Throttle for QuotaThrottle {
    async fn wait(&self, _index: usize) {
        self.limiter.until_ready().await;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoThrottle;

#[async_trait]
impl Throttle for NoThrottle {
    async fn wait(&self, _index: usize) {}
}

pub fn throttle_from_config(config: &WhatsAppConfig) -> Box<dyn Throttle> {
    let delay = Duration::from_millis(config.broadcast_delay_ms);
    match config.throttle {
        ThrottleKind::Fixed => Box::new(FixedDelay::new(delay)),
        ThrottleKind::Quota => match QuotaThrottle::with_interval(delay) {
            Some(quota) => Box::new(quota),
            None => Box::new(NoThrottle),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_skips_first_send() {
        let throttle = FixedDelay::new(Duration::from_millis(1000));
        let start = Instant::now();

        throttle.wait(0).await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        throttle.wait(1).await;
        throttle.wait(2).await;
        assert_eq!(start.elapsed(), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn test_quota_allows_burst_within_limit() {
        let throttle = QuotaThrottle::per_second(NonZeroU32::new(5).unwrap());
        let start = std::time::Instant::now();
        for i in 0..5 {
            throttle.wait(i).await;
        }
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_zero_interval_quota_is_rejected() {
        assert!(QuotaThrottle::with_interval(Duration::ZERO).is_none());
    }
}
