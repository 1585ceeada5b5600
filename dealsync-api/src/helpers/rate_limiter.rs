use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Fixed-interval limiter: callers are handed consecutive slots spaced one
/// period apart, so concurrent workers share a single request budget.
pub struct RateLimiter {
    period: Option<Duration>,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// `0` disables limiting
    pub fn per_second(requests: u32) -> Self {
        let period = (requests > 0).then(|| Duration::from_secs(1) / requests);
        Self {
            period,
            next_slot: Mutex::new(None),
        }
    }

    pub async fn acquire(&self) {
        let Some(period) = self.period else {
            return;
        };

        let slot = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = next_slot.map_or(now, |next| next.max(now));
            *next_slot = Some(slot + period);
            slot
        };

        tokio::time::sleep_until(slot).await;
    }
}
