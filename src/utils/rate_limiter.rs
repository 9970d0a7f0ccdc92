use governor::{Quota, RateLimiter as GovernorRateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::time::sleep;

/// Paces verification requests so a burst of candidates for one provider
/// does not hammer its API.
pub struct RateLimiter {
    limiter: GovernorRateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl RateLimiter {
    /// Create a new rate limiter with requests per second
    pub fn new(requests_per_second: u32) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN),
        );
        Self {
            limiter: GovernorRateLimiter::direct(quota),
        }
    }

    /// Wait until a request is allowed
    pub async fn wait(&self) {
        while self.limiter.check().is_err() {
            sleep(Duration::from_millis(100)).await;
        }
    }
}
