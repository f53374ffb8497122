use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseReason {
    /// Cooling down after the remote API answered 429.
    RateLimited,
    /// Exponential backoff after a transport or 5xx failure.
    Backoff,
}

/// Process-wide request pacing for one remote credential.
///
/// Every request waits on [`RateGate::acquire`]; retry delays go through
/// [`RateGate::pause`] so a test gate can record them instead of sleeping.
#[async_trait]
pub trait RateGate: Send + Sync {
    async fn acquire(&self);
    async fn pause(&self, reason: PauseReason, duration: Duration);
}

/// Minimum-spacing gate: one request per `60s / requests_per_minute`,
/// shared by every clone.
#[derive(Clone)]
pub struct GovernorGate {
    limiter: Arc<GovernorRateLimiter>,
    interval: Duration,
}

impl GovernorGate {
    /// `requests_per_minute` of 0 is treated as 1.
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let interval = min_interval(requests_per_minute);
        let quota = Quota::with_period(interval)
            .unwrap_or_else(|| Quota::per_minute(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::MIN);

        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[async_trait]
impl RateGate for GovernorGate {
    async fn acquire(&self) {
        self.limiter.until_ready().await;
    }

    async fn pause(&self, reason: PauseReason, duration: Duration) {
        tracing::debug!(?reason, ?duration, "pausing before retry");
        tokio::time::sleep(duration).await;
    }
}

fn min_interval(requests_per_minute: u32) -> Duration {
    Duration::from_millis(60_000 / u64::from(requests_per_minute.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn interval_derives_from_budget() {
        assert_eq!(min_interval(30), Duration::from_millis(2000));
        assert_eq!(min_interval(60), Duration::from_millis(1000));
        assert_eq!(min_interval(0), Duration::from_millis(60_000));
    }

    #[tokio::test]
    async fn first_request_passes_immediately() {
        let gate = GovernorGate::per_minute(30);
        let start = Instant::now();
        gate.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn clones_share_the_same_spacing() {
        // 600/min => 100ms spacing.
        let gate = GovernorGate::per_minute(600);
        let other = gate.clone();
        let start = Instant::now();
        gate.acquire().await;
        other.acquire().await;
        gate.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(180));
    }
}
