//! Pacing between successive work item writes.
//!
//! Work tracking APIs rate limit writes, so the reconciler waits on a
//! [`Pacer`] after every action. The production pacer sleeps for a fixed
//! interval; tests inject their own implementation to stay off the wall
//! clock.
//!
//! # Example
//!
//! ```rust
//! use todoticket_engine::pacing::{FixedIntervalPacer, Pacer, PacingDelay};
//!
//! #[tokio::main]
//! async fn main() {
//!     let pacer = FixedIntervalPacer::new(PacingDelay::from_millis(5));
//!     pacer.pause().await;
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

/// Default delay between actions, in milliseconds.
pub const DEFAULT_PACING_MS: u64 = 1000;

/// Smallest accepted delay, in milliseconds.
pub const MIN_PACING_MS: u64 = 1;

/// Largest accepted delay, in milliseconds.
pub const MAX_PACING_MS: u64 = 3000;

/// Delay imposed after each action, clamped to 1-3000 ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingDelay(Duration);

impl PacingDelay {
    /// Creates a delay, clamping `millis` into the accepted range.
    pub fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(
            millis.clamp(MIN_PACING_MS, MAX_PACING_MS),
        ))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn as_millis(&self) -> u64 {
        self.0.as_millis() as u64
    }
}

impl Default for PacingDelay {
    fn default() -> Self {
        Self::from_millis(DEFAULT_PACING_MS)
    }
}

/// Gate awaited after every reconciliation action.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self);
}

/// Sleeps for a fixed delay on every pause.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedIntervalPacer {
    delay: PacingDelay,
}

impl FixedIntervalPacer {
    pub fn new(delay: PacingDelay) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> PacingDelay {
        self.delay
    }
}

#[async_trait]
impl Pacer for FixedIntervalPacer {
    async fn pause(&self) {
        sleep(self.delay.as_duration()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn delay_is_clamped_to_range() {
        assert_eq!(PacingDelay::from_millis(0).as_millis(), 1);
        assert_eq!(PacingDelay::from_millis(250).as_millis(), 250);
        assert_eq!(PacingDelay::from_millis(10_000).as_millis(), 3000);
    }

    #[test]
    fn default_delay_is_one_second() {
        assert_eq!(
            PacingDelay::default().as_duration(),
            Duration::from_secs(1)
        );
        assert_eq!(FixedIntervalPacer::default().delay(), PacingDelay::default());
    }

    #[tokio::test]
    async fn fixed_interval_pacer_waits_at_least_the_delay() {
        let pacer = FixedIntervalPacer::new(PacingDelay::from_millis(20));
        let started = Instant::now();

        pacer.pause().await;

        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
