//! Fixed-period tick source driving the countdown.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

/// One-second ticks by default.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Monotonic tick signal.
///
/// Unlike a bare [`tokio::time::interval`], the first tick arrives one full
/// period after construction or [`reset`](Clock::reset), so a freshly armed
/// countdown never loses a second to an immediate tick.
pub struct Clock {
    interval: Interval,
}

impl Clock {
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    /// Restart the period from now.
    pub fn reset(&mut self) {
        self.interval.reset();
    }

    /// Wait for the next tick.
    pub async fn tick(&mut self) -> Instant {
        self.interval.tick().await
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(DEFAULT_TICK)
    }
}
