use std::time::Duration;
use tracing::info;

use crate::error::Result;
use super::cancel::CancelSignal;

/// Fixed pause between successive batch dispatches.
///
/// Applied between batches only, never between retries of one batch and
/// never after the final batch.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    delay: Duration,
}

impl RateLimiter {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether a pause follows the batch at `batch_number` (zero-based) out of `total`
    pub fn should_pause(&self, batch_number: usize, total: usize) -> bool {
        !self.delay.is_zero() && batch_number + 1 < total
    }

    /// Wait before dispatching the batch after `batch_number`
    pub async fn pause_after(&self, batch_number: usize, total: usize, cancel: &CancelSignal) -> Result<()> {
        if !self.should_pause(batch_number, total) {
            return Ok(());
        }

        info!("Waiting {}s before next batch...", self.delay.as_secs());
        cancel.sleep(self.delay).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_pause_after_final_batch() {
        let limiter = RateLimiter::new(Duration::from_secs(12));
        assert!(limiter.should_pause(0, 3));
        assert!(limiter.should_pause(1, 3));
        assert!(!limiter.should_pause(2, 3));
        assert!(!limiter.should_pause(0, 1));
    }

    #[test]
    fn test_zero_delay_never_pauses() {
        let limiter = RateLimiter::new(Duration::ZERO);
        assert!(!limiter.should_pause(0, 10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_waits_configured_delay() {
        let limiter = RateLimiter::new(Duration::from_secs(12));
        let started = tokio::time::Instant::now();

        tokio_test::assert_ok!(limiter.pause_after(0, 2, &CancelSignal::never()).await);
        let after_first = started.elapsed();
        assert!(after_first >= Duration::from_secs(12) && after_first < Duration::from_secs(13));

        limiter.pause_after(1, 2, &CancelSignal::never()).await.unwrap();
        assert_eq!(started.elapsed(), after_first);
    }
}
