//! Contract of the remote strategy authority.
//!
//! The engine never decides legality, scoring or what a non-human seat
//! does; it asks the [`Authority`]. Implementations decide how the calls
//! travel (HTTP in [`http_authority`](crate::http_authority), scripted fakes
//! in tests).

use std::future::Future;

use drill_core::config::SessionConfig;
use drill_core::protocol::{
    Quota, Resolution, ResolveRequest, SessionId, SessionKind, StartedSession, Summary,
};
use thiserror::Error;

/// Failures reported by (or while reaching) the authority.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorityError {
    /// The user has no allowance left for this kind of session.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The authority refused the session config.
    #[error("invalid config: {0}")]
    Validation(String),

    /// The action is not in the legal set for the current item/turn.
    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// Unknown or stale session/item/sequence id.
    #[error("not found: {0}")]
    NotFound(String),

    /// Network failure or an unusable reply.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Request/response calls the session engine makes.
///
/// Every method is a single round trip. Callers guarantee at most one
/// `resolve_turn` in flight per item/turn; implementations do not need to.
pub trait Authority: Send + Sync + 'static {
    /// `StartSession`: produce the item sequence or the first turn.
    fn start_session(
        &self,
        config: &SessionConfig,
    ) -> impl Future<Output = Result<StartedSession, AuthorityError>> + Send;

    /// `ResolveTurn`: judge one action and return what comes next.
    fn resolve_turn(
        &self,
        request: &ResolveRequest,
    ) -> impl Future<Output = Result<Resolution, AuthorityError>> + Send;

    /// `FetchSummary`: the terminal report of a finished session.
    fn fetch_summary(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<Summary, AuthorityError>> + Send;

    /// `ReplayTurnSequence`: deal the same sequence again as a new session.
    fn replay_turn_sequence(
        &self,
        sequence_id: &str,
    ) -> impl Future<Output = Result<StartedSession, AuthorityError>> + Send;

    /// Entitlement check consulted before starting a session.
    fn quota(
        &self,
        kind: SessionKind,
    ) -> impl Future<Output = Result<Quota, AuthorityError>> + Send;
}
