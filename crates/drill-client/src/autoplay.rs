//! Delayed submission on behalf of non-human seats.
//!
//! After each resolution that leaves a non-human seat to act, the driver
//! schedules one placeholder submission after a settle delay. At most one is
//! scheduled at a time; scheduling again or cancelling aborts the previous
//! timer.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::session_state::TurnKey;

pub struct AutoPlayScheduler {
    delay: Duration,
    tx: mpsc::UnboundedSender<TurnKey>,
    scheduled: Option<(TurnKey, JoinHandle<()>)>,
}

impl AutoPlayScheduler {
    pub fn new(delay: Duration, tx: mpsc::UnboundedSender<TurnKey>) -> Self {
        Self {
            delay,
            tx,
            scheduled: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Fire `key` on the channel after the settle delay.
    pub fn schedule(&mut self, key: TurnKey) {
        self.cancel();
        let tx = self.tx.clone();
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(key);
        });
        self.scheduled = Some((key, handle));
    }

    /// Claim a fired timer. Returns `false` for anything but the one
    /// currently scheduled, so every schedule yields at most one submission.
    pub fn take_due(&mut self, key: TurnKey) -> bool {
        match &self.scheduled {
            Some((scheduled, _)) if *scheduled == key => {
                self.scheduled = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        if let Some((key, handle)) = self.scheduled.take() {
            tracing::debug!(epoch = key.epoch, index = key.index, "auto-play cancelled");
            handle.abort();
        }
    }
}

impl Drop for AutoPlayScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
