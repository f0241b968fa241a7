//! Minimum inter-request interval guard.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

/// Spaces out requests made through one source instance.
///
/// The lock is held across the sleep, so concurrent callers sharing the instance are
/// released one interval apart.
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a request is allowed and record it
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                tracing::debug!("Throttle: waiting {}ms", wait.as_millis());
                sleep(wait).await;
            }
        }

        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_first_acquire_does_not_wait() {
        let throttle = Throttle::new(Duration::from_secs(5));
        let start = Instant::now();
        throttle.acquire().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_consecutive_acquires_are_spaced() {
        let throttle = Throttle::new(Duration::from_millis(60));
        let start = Instant::now();
        throttle.acquire().await;
        throttle.acquire().await;
        throttle.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(115));
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_the_interval() {
        let throttle = Arc::new(Throttle::new(Duration::from_millis(50)));
        let start = Instant::now();

        let tasks: Vec<_> = (0..3)
            .map(|_| {
                let throttle = Arc::clone(&throttle);
                tokio::spawn(async move { throttle.acquire().await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert!(start.elapsed() >= Duration::from_millis(95));
    }
}
