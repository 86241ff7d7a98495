//! Background `ResolveTurn` round trips.
//!
//! Each dispatch runs on its own task and reports back on the driver's
//! channel tagged with the [`TurnKey`] it was issued for. Whether the reply
//! still applies is decided when it is consumed, not here.

use std::sync::Arc;

use drill_core::protocol::{Resolution, ResolveRequest};
use tokio::sync::mpsc;

use crate::authority::{Authority, AuthorityError};
use crate::session_state::{SubmitOrigin, TurnKey};

/// A finished round trip.
#[derive(Debug)]
pub struct Resolved {
    pub key: TurnKey,
    pub origin: SubmitOrigin,
    pub outcome: Result<Resolution, AuthorityError>,
}

pub struct ResolutionClient<A> {
    authority: Arc<A>,
    tx: mpsc::UnboundedSender<Resolved>,
}

impl<A: Authority> ResolutionClient<A> {
    pub fn new(authority: Arc<A>, tx: mpsc::UnboundedSender<Resolved>) -> Self {
        Self { authority, tx }
    }

    /// Send `request` to the authority without waiting for the reply.
    pub fn dispatch(
        &self,
        key: TurnKey,
        origin: SubmitOrigin,
        request: ResolveRequest,
    ) {
        let authority = Arc::clone(&self.authority);
        let tx = self.tx.clone();
        tracing::debug!(
            session = %request.session_id,
            index = request.turn_index,
            action = %request.action,
            ?origin,
            "dispatching resolution"
        );
        tokio::spawn(async move {
            let outcome = authority.resolve_turn(&request).await;
            if let Err(e) = &outcome {
                tracing::warn!(index = request.turn_index, error = %e, "resolution failed");
            }
            // The driver may already be gone.
            let _ = tx.send(Resolved {
                key,
                origin,
                outcome,
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedAuthority, progress};
    use drill_core::protocol::{Action, SessionId};

    fn request() -> ResolveRequest {
        ResolveRequest {
            session_id: SessionId::new("s"),
            turn_index: 4,
            item_id: Some(4),
            action: Action::new("call"),
            amount: None,
            response_time_ms: None,
        }
    }

    #[tokio::test]
    async fn reply_is_tagged_with_its_key() {
        let authority = ScriptedAuthority::new();
        authority.push_resolution(Ok(progress(true, 5)));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = ResolutionClient::new(Arc::new(authority.clone()), tx);

        let key = TurnKey { epoch: 2, index: 4 };
        client.dispatch(key, SubmitOrigin::Human, request());

        let resolved = rx.recv().await.unwrap();
        assert_eq!(resolved.key, key);
        assert_eq!(resolved.origin, SubmitOrigin::Human);
        assert!(resolved.outcome.is_ok());
        assert_eq!(authority.requests(), vec![request()]);
    }

    #[tokio::test]
    async fn failures_are_reported_not_dropped() {
        let authority = ScriptedAuthority::new();
        authority.push_resolution(Err(AuthorityError::Transport("reset".to_string())));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = ResolutionClient::new(Arc::new(authority), tx);

        client.dispatch(TurnKey { epoch: 1, index: 0 }, SubmitOrigin::Timeout, request());

        let resolved = rx.recv().await.unwrap();
        assert_eq!(
            resolved.outcome,
            Err(AuthorityError::Transport("reset".to_string()))
        );
    }
}
