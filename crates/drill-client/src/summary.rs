//! Terminal summary of a finished session.
//!
//! When the final resolution embeds the summary it is adopted as is and no
//! extra call is made. Otherwise one `FetchSummary` is requested; if that
//! fails the session stays terminal with no summary and the fetch may be
//! retried.

use drill_core::protocol::{SessionId, Summary};

use crate::authority::AuthorityError;
use crate::session_state::SessionError;

#[derive(Debug, Clone, Default, PartialEq)]
enum SummaryState {
    #[default]
    Empty,
    Fetching(SessionId),
    Ready(Box<Summary>),
    Failed {
        session_id: SessionId,
        error: SessionError,
    },
}

/// What the driver must do after a terminal resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Terminal {
    Adopted,
    Fetch(SessionId),
}

#[derive(Debug, Default)]
pub struct SummaryAggregator {
    state: SummaryState,
}

impl SummaryAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(&self) -> Option<&Summary> {
        match &self.state {
            SummaryState::Ready(summary) => Some(summary),
            _ => None,
        }
    }

    /// The sequence for `session_id` closed.
    pub fn on_terminal(&mut self, session_id: SessionId, embedded: Option<Box<Summary>>) -> Terminal {
        match embedded {
            Some(summary) => {
                tracing::info!(session = %session_id, total = summary.total, "summary adopted");
                self.state = SummaryState::Ready(summary);
                Terminal::Adopted
            }
            None => {
                self.state = SummaryState::Fetching(session_id.clone());
                Terminal::Fetch(session_id)
            }
        }
    }

    /// Consume a `FetchSummary` reply. Replies for anything but the fetch in
    /// progress are stale.
    pub fn on_fetched(
        &mut self,
        session_id: &SessionId,
        outcome: Result<Summary, AuthorityError>,
    ) -> Result<&Summary, SessionError> {
        match &self.state {
            SummaryState::Fetching(expected) if expected == session_id => {}
            _ => return Err(SessionError::StaleRequest),
        }

        match outcome {
            Ok(summary) => {
                tracing::info!(session = %session_id, total = summary.total, "summary fetched");
                self.state = SummaryState::Ready(Box::new(summary));
                self.summary().ok_or(SessionError::StaleRequest)
            }
            Err(e) => {
                tracing::warn!(session = %session_id, error = %e, "summary fetch failed");
                let error = SessionError::Summary(e);
                self.state = SummaryState::Failed {
                    session_id: session_id.clone(),
                    error: error.clone(),
                };
                Err(error)
            }
        }
    }

    /// Re-request a failed fetch.
    pub fn retry(&mut self) -> Result<SessionId, SessionError> {
        match &self.state {
            SummaryState::Failed { session_id, .. } => {
                let session_id = session_id.clone();
                self.state = SummaryState::Fetching(session_id.clone());
                Ok(session_id)
            }
            SummaryState::Fetching(_) => Err(SessionError::AlreadyPending),
            SummaryState::Empty | SummaryState::Ready(_) => Err(SessionError::InactiveSession),
        }
    }

    /// Sequence id to replay, if the authority marked the session eligible.
    pub fn replay_target(&self) -> Result<String, SessionError> {
        let summary = self.summary().ok_or(SessionError::ReplayNotEligible)?;
        if !summary.can_replay {
            return Err(SessionError::ReplayNotEligible);
        }
        Ok(summary
            .replay_target()
            .map(str::to_string)
            .unwrap_or_else(|| summary.session_id.to_string()))
    }

    pub fn reset(&mut self) {
        self.state = SummaryState::Empty;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::summary;
    use tokio_test::{assert_err, assert_ok};

    fn id() -> SessionId {
        SessionId::new("s1")
    }

    #[test]
    fn embedded_summary_is_adopted() {
        let mut agg = SummaryAggregator::new();
        let next = agg.on_terminal(id(), Some(Box::new(summary("s1", 10, 7))));
        assert_eq!(next, Terminal::Adopted);
        assert_eq!(agg.summary().unwrap().correct, Some(7));
    }

    #[test]
    fn missing_summary_is_fetched() {
        let mut agg = SummaryAggregator::new();
        assert_eq!(agg.on_terminal(id(), None), Terminal::Fetch(id()));
        let s = assert_ok!(agg.on_fetched(&id(), Ok(summary("s1", 10, 7))));
        assert_eq!(s.total, 10);
    }

    #[test]
    fn failed_fetch_can_be_retried() {
        let mut agg = SummaryAggregator::new();
        agg.on_terminal(id(), None);
        let err = assert_err!(agg.on_fetched(
            &id(),
            Err(AuthorityError::Transport("down".to_string()))
        ));
        assert!(matches!(err, SessionError::Summary(_)));
        assert!(agg.summary().is_none());

        assert_eq!(agg.retry(), Ok(id()));
        assert_ok!(agg.on_fetched(&id(), Ok(summary("s1", 10, 7))));
        assert_eq!(agg.retry(), Err(SessionError::InactiveSession));
    }

    #[test]
    fn late_fetch_after_reset_is_stale() {
        let mut agg = SummaryAggregator::new();
        agg.on_terminal(id(), None);
        agg.reset();
        assert_eq!(
            agg.on_fetched(&id(), Ok(summary("s1", 10, 7))).err(),
            Some(SessionError::StaleRequest)
        );
        assert!(agg.summary().is_none());
    }

    #[test]
    fn replay_requires_eligibility() {
        let mut agg = SummaryAggregator::new();
        assert_eq!(agg.replay_target(), Err(SessionError::ReplayNotEligible));

        agg.on_terminal(id(), Some(Box::new(summary("s1", 1, 0))));
        assert_eq!(agg.replay_target(), Err(SessionError::ReplayNotEligible));

        let mut eligible = summary("s1", 1, 0);
        eligible.can_replay = true;
        eligible.replay_id = Some("seq-9".to_string());
        agg.on_terminal(id(), Some(Box::new(eligible)));
        assert_eq!(agg.replay_target(), Ok("seq-9".to_string()));
    }
}
