//! Pacing for upstream calls (LLM completions, chat sends).

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};

#[async_trait]
pub trait Throttle: Send + Sync {
    /// Wait until the next call may go out.
    async fn acquire(&self);
}

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Token bucket with a burst of one: the first call passes immediately, every
/// following call waits until `period` has elapsed since the previous one.
pub struct FixedInterval {
    limiter: Option<DirectLimiter>,
}

impl FixedInterval {
    /// A zero period disables pacing.
    pub fn new(period: Duration) -> Self {
        let limiter = Quota::with_period(period)
            .map(|q| q.allow_burst(NonZeroU32::MIN))
            .map(RateLimiter::direct);
        Self { limiter }
    }
}

#[async_trait]
impl Throttle for FixedInterval {
    async fn acquire(&self) {
        if let Some(l) = &self.limiter {
            l.until_ready().await;
        }
    }
}

/// No pacing at all.
pub struct Unthrottled;

#[async_trait]
impl Throttle for Unthrottled {
    async fn acquire(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn first_call_is_immediate_then_spaced() {
        let t = FixedInterval::new(Duration::from_millis(80));
        let start = Instant::now();
        t.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(40));
        t.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn zero_period_never_waits() {
        let t = FixedInterval::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..5 {
            t.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
