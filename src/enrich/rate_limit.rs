//! Process-wide spacing between text-generation calls.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Guarantees at least `cooldown` between successive [`wait`](Self::wait)
/// returns. Not a token bucket: there is no burst allowance.
#[derive(Debug)]
pub struct RateLimiter {
    cooldown: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_call: Mutex::new(None),
        }
    }

    /// Sleep until the cooldown since the previous call has elapsed, then
    /// record now as the latest call. Concurrent callers queue on the lock,
    /// so each is spaced from the one before it.
    pub async fn wait(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.cooldown {
                let remaining = self.cooldown - elapsed;
                debug!(wait_ms = remaining.as_millis() as u64, "Respecting AI cooldown");
                tokio::time::sleep(remaining).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}
