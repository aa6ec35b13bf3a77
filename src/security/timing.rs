//! Timing side-channel helpers for the sign-in path
//!
//! Failed sign-ins must not reveal, through response time, whether the email
//! exists or which check rejected it. Cached tokens are compared without
//! short-circuiting on the first differing byte.

use std::time::Duration;
use tokio::time::Instant;

/// Compare a presented token with the cached one in time independent of
/// where they differ. Lengths are not secret.
pub fn constant_time_eq(presented: &str, cached: &str) -> bool {
    let (presented, cached) = (presented.as_bytes(), cached.as_bytes());
    if presented.len() != cached.len() {
        return false;
    }

    presented
        .iter()
        .zip(cached)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

/// Sleep until at least `min_duration` has passed since `started`
pub async fn add_auth_delay(started: Instant, min_duration: Duration) {
    tokio::time::sleep_until(started + min_duration).await;
}

/// Pads a sign-in attempt to a minimum duration, measured from creation
pub struct AuthTimer {
    started: Instant,
    min_duration: Duration,
}

impl AuthTimer {
    pub fn new(min_duration: Duration) -> Self {
        Self {
            started: Instant::now(),
            min_duration,
        }
    }

    /// Time still to wait before the response may leave
    pub fn remaining(&self) -> Duration {
        self.min_duration.saturating_sub(self.started.elapsed())
    }

    pub async fn wait(self) {
        add_auth_delay(self.started, self.min_duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_comparison() {
        assert!(constant_time_eq("eyJ.a.b", "eyJ.a.b"));
        assert!(!constant_time_eq("eyJ.a.b", "eyJ.a.c"));
        assert!(!constant_time_eq("eyJ.a.b", "eyJ.a"));
        assert!(!constant_time_eq("", "x"));
        assert!(constant_time_eq("", ""));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_sign_in_padded() {
        let timer = AuthTimer::new(Duration::from_millis(100));
        let start = Instant::now();
        tokio::time::advance(Duration::from_millis(30)).await;
        assert_eq!(timer.remaining(), Duration::from_millis(70));

        timer.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempt_not_delayed_further() {
        let start = Instant::now();
        tokio::time::advance(Duration::from_millis(250)).await;
        add_auth_delay(start, Duration::from_millis(100)).await;
        assert_eq!(start.elapsed(), Duration::from_millis(250));
    }
}
