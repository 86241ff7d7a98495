use std::time::Duration;

use drill_core::protocol::{AUTOPLAY_ACTION, DEFAULT_TIME_BUDGET_SECS, TIMEOUT_ACTION};
use drill_core::sizing::Sizing;

use crate::clock::DEFAULT_TICK;

/// Delay between a resolution and the auto-play submission that follows it.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Knobs of the session driver.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Period of the countdown clock.
    pub tick_interval: Duration,
    /// Pause before a non-human seat's placeholder action is submitted, so
    /// the previous resolution can be shown.
    pub settle_delay: Duration,
    /// Countdown for items that carry no time limit of their own.
    pub default_time_budget_secs: u32,
    pub autoplay_action: String,
    pub timeout_action: String,
    /// Consult the quota before every start.
    pub check_quota: bool,
    /// Bet sizing offered for hand turns.
    pub sizing: Sizing,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            tick_interval: DEFAULT_TICK,
            settle_delay: DEFAULT_SETTLE_DELAY,
            default_time_budget_secs: DEFAULT_TIME_BUDGET_SECS,
            autoplay_action: AUTOPLAY_ACTION.to_string(),
            timeout_action: TIMEOUT_ACTION.to_string(),
            check_quota: true,
            sizing: Sizing::default(),
        }
    }
}

impl ClientConfig {
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_default_time_budget(mut self, secs: u32) -> Self {
        self.default_time_budget_secs = secs;
        self
    }

    pub fn with_quota_check(mut self, enabled: bool) -> Self {
        self.check_quota = enabled;
        self
    }

    pub fn with_sizing(mut self, sizing: Sizing) -> Self {
        self.sizing = sizing;
        self
    }
}
