//! Fixtures and a scripted in-memory [`Authority`] for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use drill_core::config::SessionConfig;
use drill_core::protocol::{
    Action, Item, KeySpot, Player, Quota, Resolution, ResolveRequest, SessionId, SessionKind,
    SessionPlan, StartedSession, Street, Summary, Turn, Verdict,
};

use crate::authority::{Authority, AuthorityError};

pub const HERO_SEAT: u8 = 3;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn item(id: u64) -> Item {
    Item {
        id,
        hand: "AKs".to_string(),
        position: "BTN".to_string(),
        vs_position: None,
        action_to_you: "open".to_string(),
        options: vec![Action::new("fold"), Action::new("raise")],
        difficulty: None,
        time_limit: None,
    }
}

pub fn started_training(id: &str, items: Vec<Item>) -> StartedSession {
    StartedSession {
        session_id: SessionId::new(id),
        plan: SessionPlan::Training { items },
        time_budget_per_item: None,
    }
}

fn seat(seat: u8, position: &str) -> Player {
    let is_hero = seat == HERO_SEAT;
    Player {
        seat,
        position: position.to_string(),
        stack: 100.0,
        committed_this_street: 0.0,
        total_committed: 0.0,
        in_hand: true,
        is_hero,
        is_active: true,
        hole_cards: is_hero.then(|| vec!["Ah".to_string(), "Kh".to_string()]),
    }
}

/// A preflop snapshot with the hero on seat 3 and `to_act` to move.
pub fn hand_turn(to_act: Option<u8>) -> Turn {
    let mut bb = seat(2, "BB");
    bb.committed_this_street = 1.0;
    bb.total_committed = 1.0;
    Turn {
        street: Street::Preflop,
        players: vec![seat(1, "SB"), bb, seat(HERO_SEAT, "BTN"), seat(4, "CO")],
        button_seat: HERO_SEAT,
        pot: 1.5,
        current_bet: 1.0,
        community_cards: Vec::new(),
        to_act_seat: to_act,
        hero_seat: HERO_SEAT,
        hero_cards: vec!["Ah".to_string(), "Kh".to_string()],
        min_raise_to: Some(2.0),
        legal_actions: vec![Action::new("fold"), Action::new("call"), Action::new("raise")],
        key_spot: None,
    }
}

pub fn key_spot() -> KeySpot {
    KeySpot {
        street: Street::Preflop,
        context_id: "btn_open_100bb".to_string(),
        pot_type: None,
        ip_oop: Some("IP".to_string()),
        spr_bucket: None,
        board: Vec::new(),
        hero_hand: "AhKh".to_string(),
        hero_hand_bucket: None,
        legal_actions: vec![Action::new("fold"), Action::new("raise")],
        strategy: None,
        best_action: Action::new("raise"),
    }
}

pub fn started_hand(id: &str, turn: Turn, budget: Option<u32>) -> StartedSession {
    StartedSession {
        session_id: SessionId::new(id),
        plan: SessionPlan::Hand { turn },
        time_budget_per_item: budget,
    }
}

pub fn verdict(correct: bool, score_delta: u32) -> Verdict {
    Verdict {
        correct: Some(correct),
        score_delta,
        ..Default::default()
    }
}

/// Training progress to the next issued item.
pub fn progress(correct: bool, score_delta: u32) -> Resolution {
    Resolution::Progress {
        verdict: verdict(correct, score_delta),
        next_turn: None,
        actions: Vec::new(),
    }
}

/// Hand progress to `turn`.
pub fn progress_to(turn: Turn) -> Resolution {
    Resolution::Progress {
        verdict: Verdict::default(),
        next_turn: Some(Box::new(turn)),
        actions: Vec::new(),
    }
}

pub fn completion(summary: Option<Summary>) -> Resolution {
    Resolution::Completion {
        verdict: verdict(true, 10),
        final_turn: None,
        actions: Vec::new(),
        summary: summary.map(Box::new),
    }
}

pub fn summary(id: &str, total: u32, correct: u32) -> Summary {
    Summary {
        session_id: SessionId::new(id),
        total,
        correct: Some(correct),
        accuracy: None,
        records: Vec::new(),
        review: None,
        can_replay: false,
        replay_id: None,
    }
}

// ---------------------------------------------------------------------------
// Scripted authority
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Script {
    starts: VecDeque<Result<StartedSession, AuthorityError>>,
    resolutions: VecDeque<Result<Resolution, AuthorityError>>,
    summaries: VecDeque<Result<Summary, AuthorityError>>,
    replays: VecDeque<Result<StartedSession, AuthorityError>>,
    quota: Option<Result<Quota, AuthorityError>>,
    start_delay: Duration,
    resolve_delay: Duration,
    summary_delay: Duration,

    configs: Vec<SessionConfig>,
    requests: Vec<ResolveRequest>,
    summary_calls: usize,
    replay_calls: Vec<String>,
    quota_calls: usize,
}

/// Answers from queues filled by the test and records every call.
///
/// An empty queue answers with a transport error. Delays are applied after
/// the answer is taken, so a paused clock can hold a call in flight.
#[derive(Clone, Default)]
pub struct ScriptedAuthority {
    script: Arc<Mutex<Script>>,
}

fn unscripted(call: &str) -> AuthorityError {
    AuthorityError::Transport(format!("no scripted reply for {call}"))
}

impl ScriptedAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    pub fn push_start(&self, reply: Result<StartedSession, AuthorityError>) -> &Self {
        self.lock().starts.push_back(reply);
        self
    }

    pub fn push_resolution(&self, reply: Result<Resolution, AuthorityError>) -> &Self {
        self.lock().resolutions.push_back(reply);
        self
    }

    pub fn push_summary(&self, reply: Result<Summary, AuthorityError>) -> &Self {
        self.lock().summaries.push_back(reply);
        self
    }

    pub fn push_replay(&self, reply: Result<StartedSession, AuthorityError>) -> &Self {
        self.lock().replays.push_back(reply);
        self
    }

    pub fn set_quota(&self, quota: Result<Quota, AuthorityError>) -> &Self {
        self.lock().quota = Some(quota);
        self
    }

    pub fn set_start_delay(&self, delay: Duration) -> &Self {
        self.lock().start_delay = delay;
        self
    }

    pub fn set_resolve_delay(&self, delay: Duration) -> &Self {
        self.lock().resolve_delay = delay;
        self
    }

    pub fn set_summary_delay(&self, delay: Duration) -> &Self {
        self.lock().summary_delay = delay;
        self
    }

    pub fn configs(&self) -> Vec<SessionConfig> {
        self.lock().configs.clone()
    }

    pub fn requests(&self) -> Vec<ResolveRequest> {
        self.lock().requests.clone()
    }

    pub fn resolve_calls(&self) -> usize {
        self.lock().requests.len()
    }

    pub fn summary_calls(&self) -> usize {
        self.lock().summary_calls
    }

    pub fn replay_calls(&self) -> Vec<String> {
        self.lock().replay_calls.clone()
    }

    pub fn quota_calls(&self) -> usize {
        self.lock().quota_calls
    }
}

async fn after<T>(delay: Duration, reply: T) -> T {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    reply
}

impl Authority for ScriptedAuthority {
    async fn start_session(&self, config: &SessionConfig) -> Result<StartedSession, AuthorityError> {
        let (reply, delay) = {
            let mut script = self.lock();
            script.configs.push(config.clone());
            let reply = script
                .starts
                .pop_front()
                .unwrap_or_else(|| Err(unscripted("start_session")));
            (reply, script.start_delay)
        };
        after(delay, reply).await
    }

    async fn resolve_turn(&self, request: &ResolveRequest) -> Result<Resolution, AuthorityError> {
        let (reply, delay) = {
            let mut script = self.lock();
            script.requests.push(request.clone());
            let reply = script
                .resolutions
                .pop_front()
                .unwrap_or_else(|| Err(unscripted("resolve_turn")));
            (reply, script.resolve_delay)
        };
        after(delay, reply).await
    }

    async fn fetch_summary(&self, _session_id: &SessionId) -> Result<Summary, AuthorityError> {
        let (reply, delay) = {
            let mut script = self.lock();
            script.summary_calls += 1;
            let reply = script
                .summaries
                .pop_front()
                .unwrap_or_else(|| Err(unscripted("fetch_summary")));
            (reply, script.summary_delay)
        };
        after(delay, reply).await
    }

    async fn replay_turn_sequence(&self, sequence_id: &str) -> Result<StartedSession, AuthorityError> {
        let (reply, delay) = {
            let mut script = self.lock();
            script.replay_calls.push(sequence_id.to_string());
            let reply = script
                .replays
                .pop_front()
                .unwrap_or_else(|| Err(unscripted("replay_turn_sequence")));
            (reply, script.start_delay)
        };
        after(delay, reply).await
    }

    async fn quota(&self, _kind: SessionKind) -> Result<Quota, AuthorityError> {
        let mut script = self.lock();
        script.quota_calls += 1;
        script.quota.clone().unwrap_or(Ok(Quota {
            remaining: None,
            unlimited: true,
        }))
    }
}
