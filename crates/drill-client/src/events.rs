use std::time::Duration;

use drill_core::protocol::{Action, KeySpot, SessionId, SessionKind, Summary, Verdict};

use crate::session_state::{SessionError, SubmitOrigin};

/// Semantic category, for styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCategory {
    Lifecycle,
    Prompt,
    Timer,
    Result,
    Error,
}

/// Everything the driver reports to a frontend, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A session (or replay) was loaded. `total` is set for training.
    Started {
        session_id: SessionId,
        kind: SessionKind,
        total: Option<usize>,
    },
    /// The hero must act on item/turn `index`.
    AwaitingInput {
        index: u32,
        budget_secs: Option<u32>,
        legal_actions: Vec<Action>,
    },
    /// Countdown tick for item/turn `index`.
    Countdown { index: u32, remaining: u32 },
    /// A resolution request was sent.
    Submitted {
        index: u32,
        action: Action,
        amount: Option<f64>,
        origin: SubmitOrigin,
    },
    /// The authority judged the submission for `index`.
    Resolved { index: u32, verdict: Verdict },
    /// A non-human seat will be played after `delay`.
    AutoPlayScheduled {
        index: u32,
        seat: Option<u8>,
        delay: Duration,
    },
    /// The current hand turn is a graded decision point.
    KeySpot { index: u32, spot: KeySpot },
    /// An operation failed. `index` is the item/turn it applied to.
    Rejected {
        index: Option<u32>,
        error: SessionError,
    },
    /// The summary is available.
    Completed { summary: Box<Summary> },
    /// The sequence closed but the summary could not be fetched.
    SummaryFailed { error: SessionError },
    /// The session was abandoned.
    Cancelled,
}

impl SessionEvent {
    pub fn category(&self) -> EventCategory {
        match self {
            Self::Started { .. } | Self::Completed { .. } | Self::Cancelled => {
                EventCategory::Lifecycle
            }
            Self::AwaitingInput { .. } | Self::KeySpot { .. } => EventCategory::Prompt,
            Self::Countdown { .. } | Self::AutoPlayScheduled { .. } => EventCategory::Timer,
            Self::Submitted { .. } | Self::Resolved { .. } => EventCategory::Result,
            Self::Rejected { .. } | Self::SummaryFailed { .. } => EventCategory::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.category() == EventCategory::Error
    }
}
