//! HTTP binding of the [`Authority`] contract.
//!
//! | Call                 | Method | Path                          |
//! |----------------------|--------|-------------------------------|
//! | `StartSession`       | `POST` | `/sessions`                   |
//! | `ResolveTurn`        | `POST` | `/sessions/{id}/resolve`      |
//! | `FetchSummary`       | `GET`  | `/sessions/{id}/summary`      |
//! | `ReplayTurnSequence` | `POST` | `/sequences/{id}/replay`      |
//! | quota                | `GET`  | `/quota/{kind}`               |
//!
//! Non-2xx replies carry `{"detail": "..."}`; the status code selects the
//! [`AuthorityError`] variant.

use std::time::Duration;

use drill_core::config::SessionConfig;
use drill_core::protocol::{
    ErrorBody, Quota, Resolution, ResolveRequest, ResolveTurnResponse, SessionId, SessionKind,
    StartedSession, Summary,
};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::authority::{Authority, AuthorityError};

/// Connection settings for [`HttpAuthority`].
#[derive(Debug, Clone)]
pub struct HttpAuthorityConfig {
    /// Base URL including any version prefix, e.g. `http://host/api/v1`.
    pub base_url: String,
    /// Bearer token attached to every request.
    pub api_token: Option<String>,
    pub request_timeout: Duration,
}

impl HttpAuthorityConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: None,
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Which call a reply belongs to; 400-class codes mean different things
/// for different calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Call {
    Start,
    Resolve,
    Summary,
    Replay,
    Quota,
}

/// [`Authority`] over JSON/HTTP.
pub struct HttpAuthority {
    client: reqwest::Client,
    config: HttpAuthorityConfig,
}

impl HttpAuthority {
    pub fn new(config: HttpAuthorityConfig) -> Result<Self, AuthorityError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AuthorityError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.config.api_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        call: Call,
        req: RequestBuilder,
    ) -> Result<T, AuthorityError> {
        let response = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| AuthorityError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(error_from_response(call, response).await);
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AuthorityError::Transport(format!("malformed reply: {e}")))
    }
}

async fn error_from_response(call: Call, response: Response) -> AuthorityError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| b.detail)
        .unwrap_or(text);
    classify(call, status, detail)
}

fn classify(call: Call, status: StatusCode, detail: String) -> AuthorityError {
    match status {
        StatusCode::FORBIDDEN | StatusCode::PAYMENT_REQUIRED | StatusCode::TOO_MANY_REQUESTS => {
            AuthorityError::QuotaExceeded(detail)
        }
        StatusCode::NOT_FOUND => AuthorityError::NotFound(detail),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => match call {
            Call::Resolve => AuthorityError::InvalidAction(detail),
            Call::Start | Call::Replay | Call::Quota | Call::Summary => {
                AuthorityError::Validation(detail)
            }
        },
        _ => AuthorityError::Transport(format!("HTTP {status}: {detail}")),
    }
}

impl Authority for HttpAuthority {
    async fn start_session(&self, config: &SessionConfig) -> Result<StartedSession, AuthorityError> {
        let req = self.client.post(self.url("/sessions")).json(config);
        self.send(Call::Start, req).await
    }

    async fn resolve_turn(&self, request: &ResolveRequest) -> Result<Resolution, AuthorityError> {
        let path = format!("/sessions/{}/resolve", request.session_id);
        let req = self.client.post(self.url(&path)).json(request);
        let reply: ResolveTurnResponse = self.send(Call::Resolve, req).await?;
        Ok(Resolution::from(reply))
    }

    async fn fetch_summary(&self, session_id: &SessionId) -> Result<Summary, AuthorityError> {
        let path = format!("/sessions/{session_id}/summary");
        let req = self.client.get(self.url(&path));
        self.send(Call::Summary, req).await
    }

    async fn replay_turn_sequence(&self, sequence_id: &str) -> Result<StartedSession, AuthorityError> {
        let path = format!("/sequences/{sequence_id}/replay");
        let req = self.client.post(self.url(&path));
        self.send(Call::Replay, req).await
    }

    async fn quota(&self, kind: SessionKind) -> Result<Quota, AuthorityError> {
        let kind = match kind {
            SessionKind::Training => "training",
            SessionKind::Hand => "hand",
        };
        let req = self.client.get(self.url(&format!("/quota/{kind}")));
        self.send(Call::Quota, req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{item, started_training};
    use axum::extract::Path;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use drill_core::config::TrainingConfig;
    use drill_core::protocol::{Action, Verdict};
    use tokio_test::{assert_err, assert_ok};

    async fn start_session_handler(Json(config): Json<SessionConfig>) -> Json<StartedSession> {
        let SessionConfig::Training(cfg) = config else {
            panic!("expected a training config");
        };
        let items = (0..cfg.item_count as u64).map(item).collect();
        Json(started_training("s-1", items))
    }

    async fn resolve_handler(
        Path(id): Path<String>,
        Json(req): Json<ResolveRequest>,
    ) -> Result<Json<ResolveTurnResponse>, (AxumStatus, Json<ErrorBody>)> {
        if req.action.as_str() == "shove" {
            return Err((
                AxumStatus::BAD_REQUEST,
                Json(ErrorBody {
                    detail: "shove is not a legal option".to_string(),
                }),
            ));
        }
        assert_eq!(id, req.session_id.as_str());
        Ok(Json(ResolveTurnResponse {
            verdict: Verdict {
                correct: Some(req.action.as_str() == "fold"),
                correct_action: Some(Action::new("fold")),
                score_delta: 10,
                ..Default::default()
            },
            complete: req.turn_index == 1,
            ..Default::default()
        }))
    }

    async fn spawn_authority() -> HttpAuthority {
        let app = Router::new()
            .route("/api/sessions", post(start_session_handler))
            .route("/api/sessions/{id}/resolve", post(resolve_handler))
            .route(
                "/api/sessions/{id}/summary",
                get(|| async {
                    (
                        AxumStatus::NOT_FOUND,
                        Json(ErrorBody {
                            detail: "session expired".to_string(),
                        }),
                    )
                }),
            )
            .route(
                "/api/quota/{kind}",
                get(|| async { (AxumStatus::FORBIDDEN, "daily limit reached") }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = HttpAuthorityConfig::new(format!("http://{addr}/api/")).with_token("t0k");
        HttpAuthority::new(config).unwrap()
    }

    fn request(index: u32, action: &str) -> ResolveRequest {
        ResolveRequest {
            session_id: SessionId::new("s-1"),
            turn_index: index,
            item_id: Some(u64::from(index)),
            action: Action::new(action),
            amount: None,
            response_time_ms: Some(1800),
        }
    }

    #[tokio::test]
    async fn start_and_resolve_round_trip() {
        let authority = spawn_authority().await;
        let config = SessionConfig::Training(TrainingConfig {
            item_count: 2,
            ..Default::default()
        });

        let started = assert_ok!(authority.start_session(&config).await);
        assert_eq!(started.session_id.as_str(), "s-1");

        let first = assert_ok!(authority.resolve_turn(&request(0, "fold")).await);
        assert!(!first.is_complete());
        assert_eq!(first.verdict().correct, Some(true));

        let last = assert_ok!(authority.resolve_turn(&request(1, "call")).await);
        assert!(last.is_complete());
    }

    #[tokio::test]
    async fn status_codes_map_to_error_kinds() {
        let authority = spawn_authority().await;

        let err = assert_err!(authority.resolve_turn(&request(0, "shove")).await);
        assert_eq!(
            err,
            AuthorityError::InvalidAction("shove is not a legal option".to_string())
        );

        let err = assert_err!(authority.fetch_summary(&SessionId::new("s-1")).await);
        assert_eq!(err, AuthorityError::NotFound("session expired".to_string()));

        let err = assert_err!(authority.quota(SessionKind::Hand).await);
        assert_eq!(
            err,
            AuthorityError::QuotaExceeded("daily limit reached".to_string())
        );
    }

    #[tokio::test]
    async fn unreachable_authority_is_a_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let authority =
            HttpAuthority::new(HttpAuthorityConfig::new(format!("http://{addr}"))).unwrap();
        let err = assert_err!(authority.fetch_summary(&SessionId::new("x")).await);
        assert!(matches!(err, AuthorityError::Transport(_)));
    }

    #[test]
    fn bad_request_depends_on_call() {
        assert_eq!(
            classify(Call::Start, StatusCode::UNPROCESSABLE_ENTITY, "bad".into()),
            AuthorityError::Validation("bad".into())
        );
        assert_eq!(
            classify(Call::Resolve, StatusCode::BAD_REQUEST, "bad".into()),
            AuthorityError::InvalidAction("bad".into())
        );
        assert!(matches!(
            classify(Call::Replay, StatusCode::BAD_GATEWAY, "down".into()),
            AuthorityError::Transport(_)
        ));
    }
}
