//! Fixed-interval reconnection policy
//!
//! Waits a constant interval before every attempt and never gives up on its own; the
//! only way out besides success is the shutdown token. No backoff growth, no jitter.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Retry forever at a fixed interval until success or shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedIntervalRetry {
    interval: Duration,
}

impl FixedIntervalRetry {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run `attempt` until it succeeds.
    ///
    /// Every attempt, including the first, is preceded by one full interval. The
    /// shutdown token is checked while waiting; an attempt already in flight is allowed
    /// to finish. Returns `None` once shutdown is observed.
    pub async fn run<T, E, F, Fut>(&self, shutdown: &CancellationToken, mut attempt: F) -> Option<T>
    where
        F: FnMut(u64) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempts: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("Reconnection cancelled after {} attempts", attempts);
                    return None;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }

            attempts += 1;
            match attempt(attempts).await {
                Ok(value) => {
                    tracing::info!("Reconnected successfully (attempt {})", attempts);
                    return Some(value);
                }
                Err(e) => {
                    tracing::warn!(
                        "Reconnection attempt {} failed: {}; retrying in {}ms",
                        attempts,
                        e,
                        self.interval.as_millis()
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_attempts_are_spaced_by_interval() {
        let retry = FixedIntervalRetry::new(Duration::from_secs(3));
        let shutdown = CancellationToken::new();
        let start = Instant::now();
        let mut stamps = Vec::new();

        let result = retry
            .run(&shutdown, |n| {
                stamps.push(Instant::now() - start);
                async move {
                    if n < 4 {
                        Err(format!("refused #{n}"))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result, Some(4));
        assert_eq!(
            stamps,
            vec![
                Duration::from_secs(3),
                Duration::from_secs(6),
                Duration::from_secs(9),
                Duration::from_secs(12),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_token_stops_before_attempting() {
        let retry = FixedIntervalRetry::new(Duration::from_secs(1));
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let mut calls = 0;
        let result: Option<()> = retry
            .run(&shutdown, |_| {
                calls += 1;
                async { Err::<(), _>("unreachable") }
            })
            .await;

        assert!(result.is_none());
        assert_eq!(calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_wait_stops_loop() {
        let retry = FixedIntervalRetry::new(Duration::from_secs(5));
        let shutdown = CancellationToken::new();
        let canceller = shutdown.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            canceller.cancel();
        });

        let mut calls = 0;
        let result: Option<()> = retry
            .run(&shutdown, |_| {
                calls += 1;
                async { Err::<(), _>("down") }
            })
            .await;

        assert!(result.is_none());
        // Attempts at 5s and 10s; cancelled while waiting for 15s
        assert_eq!(calls, 2);
    }
}
