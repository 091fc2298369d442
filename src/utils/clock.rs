// src/utils/clock.rs

//! Injectable time source.
//!
//! The poll loop and the batch pacing sleep through this trait so tests can
//! simulate elapsed time without real waiting.

use std::time::{Duration, Instant};

use async_trait::async_trait;

/// Time source abstraction for polling and pacing.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Suspend the current task for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Real clock backed by tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
pub mod testing {
    //! Manual clock for tests: `sleep` advances time instantly.

    use std::sync::Mutex;

    use super::*;

    pub struct ManualClock {
        start: Instant,
        elapsed: Mutex<Duration>,
    }

    impl ManualClock {
        pub fn new() -> Self {
            Self {
                start: Instant::now(),
                elapsed: Mutex::new(Duration::ZERO),
            }
        }

        pub fn advance(&self, duration: Duration) {
            *self.elapsed.lock().unwrap() += duration;
        }
    }

    #[async_trait]
    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.start + *self.elapsed.lock().unwrap()
        }

        async fn sleep(&self, duration: Duration) {
            self.advance(duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ManualClock;
    use super::*;

    #[tokio::test]
    async fn test_manual_clock_advances_on_sleep() {
        let clock = ManualClock::new();
        let t0 = clock.now();

        clock.sleep(Duration::from_secs(30)).await;
        assert_eq!(clock.now() - t0, Duration::from_secs(30));

        clock.sleep(Duration::from_secs(30)).await;
        assert_eq!(clock.now() - t0, Duration::from_secs(60));
    }
}
