//! Per-item countdown.
//!
//! At most one countdown is armed at a time, bound to the [`TurnKey`] of the
//! item awaiting input. It fires at most once; afterwards it stays inert
//! until armed again.

use std::time::Duration;

use tokio::time::Instant;

use crate::session_state::TurnKey;

/// What a clock tick did to the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing armed.
    Inert,
    /// Still counting.
    Running { key: TurnKey, remaining: u32 },
    /// Reached zero on this tick; the countdown is now disarmed.
    Expired(TurnKey),
}

#[derive(Debug, Clone)]
struct Armed {
    key: TurnKey,
    remaining: u32,
    armed_at: Instant,
}

#[derive(Debug, Default)]
pub struct Countdown {
    armed: Option<Armed>,
}

impl Countdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm for `key`, discarding any previous countdown.
    pub fn arm(&mut self, key: TurnKey, budget_secs: u32) {
        self.armed = Some(Armed {
            key,
            remaining: budget_secs.max(1),
            armed_at: Instant::now(),
        });
    }

    /// Disarm, returning how long the countdown had been running.
    pub fn disarm(&mut self) -> Option<Duration> {
        self.armed.take().map(|a| a.armed_at.elapsed())
    }

    pub fn tick(&mut self) -> TickOutcome {
        let Some(armed) = self.armed.as_mut() else {
            return TickOutcome::Inert;
        };
        armed.remaining = armed.remaining.saturating_sub(1);
        if armed.remaining > 0 {
            return TickOutcome::Running {
                key: armed.key,
                remaining: armed.remaining,
            };
        }
        let key = armed.key;
        self.armed = None;
        TickOutcome::Expired(key)
    }

    pub fn remaining(&self) -> Option<u32> {
        self.armed.as_ref().map(|a| a.remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: TurnKey = TurnKey { epoch: 1, index: 0 };

    #[test]
    fn counts_down_and_fires_once() {
        let mut cd = Countdown::new();
        cd.arm(KEY, 3);
        assert_eq!(cd.tick(), TickOutcome::Running { key: KEY, remaining: 2 });
        assert_eq!(cd.tick(), TickOutcome::Running { key: KEY, remaining: 1 });
        assert_eq!(cd.tick(), TickOutcome::Expired(KEY));
        assert_eq!(cd.tick(), TickOutcome::Inert);
        assert_eq!(cd.remaining(), None);
    }

    #[test]
    fn arming_replaces_previous() {
        let next = TurnKey { epoch: 1, index: 1 };
        let mut cd = Countdown::new();
        cd.arm(KEY, 1);
        cd.arm(next, 2);
        assert_eq!(cd.remaining(), Some(2));
        assert_eq!(cd.tick(), TickOutcome::Running { key: next, remaining: 1 });
        assert_eq!(cd.tick(), TickOutcome::Expired(next));
    }

    #[test]
    fn disarm_makes_it_inert() {
        let mut cd = Countdown::new();
        cd.arm(KEY, 1);
        assert!(cd.disarm().is_some());
        assert_eq!(cd.tick(), TickOutcome::Inert);
        assert!(cd.disarm().is_none());
    }

    #[test]
    fn zero_budget_still_counts_one_tick() {
        let mut cd = Countdown::new();
        cd.arm(KEY, 0);
        assert_eq!(cd.remaining(), Some(1));
        assert_eq!(cd.tick(), TickOutcome::Expired(KEY));
    }

    #[tokio::test(start_paused = true)]
    async fn disarm_reports_elapsed_time() {
        let mut cd = Countdown::new();
        cd.arm(KEY, 10);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(cd.disarm(), Some(Duration::from_secs(2)));
    }
}
