//! The session state machine.
//!
//! Mirrors the authority's view of the session: which item/turn is current,
//! whether a resolution is in flight, the accumulated score and the action
//! log. Every other component reads it or goes through its operations.
//!
//! The machine is synchronous. It never performs I/O itself; operations that
//! need a round trip return a [`ResolveRequest`] for the caller to dispatch,
//! and the reply comes back through [`SessionMachine::apply_resolution`]
//! tagged with the [`TurnKey`] it was issued for.
//!
//! ```text
//! Idle ──begin──▶ Active ──Completion──▶ Terminal
//!   ▲               │                       │
//!   └────cancel─────┴───────cancel──────────┘
//! ```

use drill_core::config::ConfigError;
use drill_core::protocol::{
    Action, ActionRecord, Item, Resolution, ResolveRequest, SessionId, SessionKind, SessionPlan,
    StartedSession, Summary, Turn, Verdict,
};
use drill_core::sizing::{ProposedBet, Sizing, proposals};
use thiserror::Error;

use crate::authority::AuthorityError;
use crate::config::ClientConfig;
use crate::countdown::{Countdown, TickOutcome};

/// Identity of one item/turn.
///
/// `epoch` changes on every start and cancel, `index` on every applied
/// resolution. A reply whose key no longer matches is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TurnKey {
    pub epoch: u64,
    pub index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Active,
    Terminal,
}

/// Who triggered a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOrigin {
    Human,
    Timeout,
    AutoPlay,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    /// Config rejected locally; nothing was sent.
    #[error("invalid session config: {0}")]
    Validation(#[from] ConfigError),

    /// The factory call (or the quota check before it) failed.
    #[error("could not start session: {0}")]
    Start(AuthorityError),

    #[error("a resolution is already in flight")]
    AlreadyPending,

    #[error("no active session")]
    InactiveSession,

    #[error("action rejected: {0}")]
    InvalidAction(String),

    #[error("authority unreachable: {0}")]
    Transport(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A reply arrived for an item/turn that is no longer current.
    #[error("reply for a superseded item")]
    StaleRequest,

    /// The authority's reply does not fit the session.
    #[error("unexpected reply from authority: {0}")]
    Protocol(String),

    #[error("summary unavailable: {0}")]
    Summary(AuthorityError),

    #[error("session is not eligible for replay")]
    ReplayNotEligible,

    #[error("session driver has shut down")]
    Closed,
}

impl SessionError {
    /// Map a failed `ResolveTurn` onto the session taxonomy.
    pub fn from_resolution(err: AuthorityError) -> Self {
        match err {
            AuthorityError::InvalidAction(m) | AuthorityError::Validation(m) => {
                SessionError::InvalidAction(m)
            }
            AuthorityError::NotFound(m) => SessionError::NotFound(m),
            AuthorityError::Transport(m) => SessionError::Transport(m),
            AuthorityError::QuotaExceeded(m) => SessionError::Transport(format!("quota exceeded: {m}")),
        }
    }
}

/// The item sequence or the live hand.
#[derive(Debug, Clone)]
pub enum Progression {
    Training { items: Vec<Item> },
    Hand { turn: Box<Turn> },
}

#[derive(Debug)]
struct ActiveSession {
    id: SessionId,
    progression: Progression,
    index: u32,
    score: u32,
    log: Vec<ActionRecord>,
    pending: bool,
    time_budget: Option<u32>,
    last_verdict: Option<Verdict>,
}

/// What the caller has to do after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// The hero must act. The countdown is armed when `budget_secs` is set.
    AwaitHuman { key: TurnKey, budget_secs: Option<u32> },
    /// A non-human seat moves next; schedule an auto-play submission.
    AutoPlay { key: TurnKey, seat: Option<u8> },
    /// The sequence is closed. Hand the summary (if embedded) to the
    /// aggregator, or fetch it.
    Terminal {
        session_id: SessionId,
        summary: Option<Box<Summary>>,
    },
}

/// Result of applying a reply that belonged to the current item/turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Advanced { verdict: Verdict, step: Step },
    /// The item/turn stays current. `retry` is set when the machine already
    /// re-armed for human input.
    Failed { error: SessionError, retry: Option<Step> },
}

/// Outcome of feeding a clock tick to the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    Idle,
    Remaining { key: TurnKey, remaining: u32 },
    /// The countdown expired and a timeout submission was issued.
    TimedOut(ResolveRequest),
}

#[derive(Debug)]
pub struct SessionMachine {
    phase: Phase,
    epoch: u64,
    session: Option<ActiveSession>,
    countdown: Countdown,
    config: ClientConfig,
}

impl SessionMachine {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            phase: Phase::Idle,
            epoch: 0,
            session: None,
            countdown: Countdown::new(),
            config,
        }
    }

    // -- queries ----------------------------------------------------------

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session.as_ref().map(|s| &s.id)
    }

    pub fn kind(&self) -> Option<SessionKind> {
        self.session.as_ref().map(|s| match s.progression {
            Progression::Training { .. } => SessionKind::Training,
            Progression::Hand { .. } => SessionKind::Hand,
        })
    }

    /// Identity of the current item/turn while `Active`.
    pub fn current_key(&self) -> Option<TurnKey> {
        match (self.phase, &self.session) {
            (Phase::Active, Some(s)) => Some(TurnKey {
                epoch: self.epoch,
                index: s.index,
            }),
            _ => None,
        }
    }

    pub fn current_index(&self) -> Option<u32> {
        self.session.as_ref().map(|s| s.index)
    }

    pub fn is_pending(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.pending)
    }

    pub fn score(&self) -> u32 {
        self.session.as_ref().map(|s| s.score).unwrap_or(0)
    }

    pub fn log(&self) -> &[ActionRecord] {
        self.session.as_ref().map(|s| s.log.as_slice()).unwrap_or(&[])
    }

    pub fn last_verdict(&self) -> Option<&Verdict> {
        self.session.as_ref().and_then(|s| s.last_verdict.as_ref())
    }

    /// Number of items in a training session.
    pub fn total_items(&self) -> Option<usize> {
        match &self.session.as_ref()?.progression {
            Progression::Training { items } => Some(items.len()),
            Progression::Hand { .. } => None,
        }
    }

    pub fn current_item(&self) -> Option<&Item> {
        let s = self.session.as_ref()?;
        match &s.progression {
            Progression::Training { items } => items.get(s.index as usize),
            Progression::Hand { .. } => None,
        }
    }

    pub fn current_turn(&self) -> Option<&Turn> {
        match &self.session.as_ref()?.progression {
            Progression::Hand { turn } => Some(turn),
            Progression::Training { .. } => None,
        }
    }

    /// Legal actions for whoever acts now.
    pub fn legal_actions(&self) -> &[Action] {
        if let Some(item) = self.current_item() {
            &item.options
        } else if let Some(turn) = self.current_turn() {
            &turn.legal_actions
        } else {
            &[]
        }
    }

    pub fn countdown_remaining(&self) -> Option<u32> {
        self.countdown.remaining()
    }

    /// Advisory bet sizes for the hero's current turn.
    pub fn bet_proposals(&self, sizing: &Sizing) -> Vec<ProposedBet> {
        match self.current_turn() {
            Some(turn) if self.phase == Phase::Active && turn.hero_to_act() => {
                proposals(turn, sizing)
            }
            _ => Vec::new(),
        }
    }

    // -- transitions ------------------------------------------------------

    /// Load a freshly started session, replacing anything current.
    pub fn begin(&mut self, started: StartedSession) -> Result<Step, SessionError> {
        let progression = match started.plan {
            SessionPlan::Training { items } => {
                if items.is_empty() {
                    return Err(SessionError::Protocol("session has no items".to_string()));
                }
                if let Some(item) = items.iter().find(|i| i.options.is_empty()) {
                    return Err(SessionError::Protocol(format!(
                        "item {} has no legal actions",
                        item.id
                    )));
                }
                Progression::Training { items }
            }
            SessionPlan::Hand { turn } => Progression::Hand {
                turn: Box::new(turn),
            },
        };

        self.countdown.disarm();
        self.epoch += 1;
        self.phase = Phase::Active;
        self.session = Some(ActiveSession {
            id: started.session_id,
            progression,
            index: 0,
            score: 0,
            log: Vec::new(),
            pending: false,
            time_budget: started.time_budget_per_item.filter(|&b| b > 0),
            last_verdict: None,
        });
        Ok(self.enter_current())
    }

    /// Submit a human action for the current item/turn.
    pub fn submit(
        &mut self,
        action: Action,
        amount: Option<f64>,
    ) -> Result<ResolveRequest, SessionError> {
        let waiting_on_table = self.phase == Phase::Active
            && !self.is_pending()
            && self.current_turn().is_some_and(|t| !t.hero_to_act());
        if waiting_on_table {
            return Err(SessionError::InvalidAction(
                "it is not the hero's turn".to_string(),
            ));
        }
        self.dispatch(action, amount)
    }

    /// Advance the countdown by one tick, issuing the timeout submission when
    /// it expires.
    pub fn on_tick(&mut self) -> Tick {
        match self.countdown.tick() {
            TickOutcome::Inert => Tick::Idle,
            TickOutcome::Running { key, remaining } => Tick::Remaining { key, remaining },
            TickOutcome::Expired(key) => {
                if self.current_key() != Some(key) || self.is_pending() {
                    return Tick::Idle;
                }
                match self.dispatch(Action::new(self.config.timeout_action.clone()), None) {
                    Ok(req) => Tick::TimedOut(req),
                    Err(_) => Tick::Idle,
                }
            }
        }
    }

    /// Submit the placeholder action for a non-human seat. Returns `None`
    /// unless `key` is still current, idle, and not the hero's turn.
    pub fn auto_play(&mut self, key: TurnKey) -> Option<ResolveRequest> {
        if self.current_key() != Some(key) || self.is_pending() {
            return None;
        }
        if self.current_turn().is_none_or(|t| t.hero_to_act()) {
            return None;
        }
        self.dispatch(Action::new(self.config.autoplay_action.clone()), None)
            .ok()
    }

    /// Consume the reply to the request issued for `key`.
    ///
    /// Returns [`SessionError::StaleRequest`] without touching any state if
    /// `key` is no longer the current item/turn.
    pub fn apply_resolution(
        &mut self,
        key: TurnKey,
        outcome: Result<Resolution, AuthorityError>,
    ) -> Result<Applied, SessionError> {
        if self.current_key() != Some(key) {
            return Err(SessionError::StaleRequest);
        }
        let Some(session) = self.session.as_mut() else {
            return Err(SessionError::StaleRequest);
        };
        if !session.pending {
            return Err(SessionError::StaleRequest);
        }
        session.pending = false;

        let resolution = match outcome {
            Ok(resolution) => resolution,
            Err(err) => {
                let error = SessionError::from_resolution(err);
                return Ok(self.fail(error));
            }
        };

        match resolution {
            Resolution::Progress {
                verdict,
                next_turn,
                actions,
            } => {
                // The authority accepted the answer but left nothing to
                // play; treat the sequence as closed and fetch its summary.
                let exhausted = match &session.progression {
                    Progression::Training { items } => session.index as usize + 1 >= items.len(),
                    Progression::Hand { .. } => next_turn.is_none(),
                };
                if exhausted {
                    tracing::warn!(
                        session = %session.id,
                        index = session.index,
                        "progress reply with nothing left to play, closing"
                    );
                    return Ok(self.close(verdict, None, actions, None));
                }

                session.score = session.score.saturating_add(verdict.score_delta);
                session.log.extend(actions);
                session.index += 1;
                if let (Progression::Hand { turn }, Some(next)) =
                    (&mut session.progression, next_turn)
                {
                    *turn = next;
                }
                session.last_verdict = Some(verdict.clone());

                let step = self.enter_current();
                Ok(Applied::Advanced { verdict, step })
            }
            Resolution::Completion {
                verdict,
                final_turn,
                actions,
                summary,
            } => Ok(self.close(verdict, final_turn, actions, summary)),
        }
    }

    /// Re-offer the current turn after a failure left it idle: re-schedule
    /// auto-play for a non-human seat, or re-arm the countdown for the hero.
    pub fn resume(&mut self) -> Option<Step> {
        if self.phase != Phase::Active || self.is_pending() {
            return None;
        }
        Some(self.enter_current())
    }

    /// Drop the working state of a finished session once its summary is in
    /// hand. The machine stays `Terminal` until the next start or cancel.
    pub fn close_out(&mut self) {
        if self.phase == Phase::Terminal {
            self.countdown.disarm();
            self.session = None;
        }
    }

    /// Abandon whatever is current and return to `Idle`. Replies still in
    /// flight become stale.
    pub fn cancel(&mut self) {
        self.countdown.disarm();
        self.session = None;
        self.phase = Phase::Idle;
        self.epoch += 1;
    }

    // -- private ----------------------------------------------------------

    fn dispatch(
        &mut self,
        action: Action,
        amount: Option<f64>,
    ) -> Result<ResolveRequest, SessionError> {
        if self.phase != Phase::Active {
            return Err(SessionError::InactiveSession);
        }
        let Some(session) = self.session.as_mut() else {
            return Err(SessionError::InactiveSession);
        };
        if session.pending {
            return Err(SessionError::AlreadyPending);
        }

        session.pending = true;
        let waited = self.countdown.disarm();

        let item_id = match &session.progression {
            Progression::Training { items } => items.get(session.index as usize).map(|i| i.id),
            Progression::Hand { .. } => None,
        };

        Ok(ResolveRequest {
            session_id: session.id.clone(),
            turn_index: session.index,
            item_id,
            action,
            amount,
            response_time_ms: waited.map(|d| d.as_millis() as u64),
        })
    }

    /// Arm for the current item/turn and say who acts.
    fn enter_current(&mut self) -> Step {
        let key = TurnKey {
            epoch: self.epoch,
            index: self.session.as_ref().map(|s| s.index).unwrap_or(0),
        };
        let default_budget = self.config.default_time_budget_secs;
        let Some(session) = self.session.as_ref() else {
            return Step::AwaitHuman {
                key,
                budget_secs: None,
            };
        };

        match &session.progression {
            Progression::Training { items } => {
                let budget = items
                    .get(session.index as usize)
                    .and_then(Item::time_budget)
                    .or(session.time_budget)
                    .unwrap_or(default_budget);
                self.countdown.arm(key, budget);
                Step::AwaitHuman {
                    key,
                    budget_secs: Some(budget),
                }
            }
            Progression::Hand { turn } if turn.hero_to_act() => {
                let budget = session.time_budget;
                match budget {
                    Some(b) => self.countdown.arm(key, b),
                    None => {
                        self.countdown.disarm();
                    }
                }
                Step::AwaitHuman {
                    key,
                    budget_secs: budget,
                }
            }
            Progression::Hand { turn } => {
                self.countdown.disarm();
                Step::AutoPlay {
                    key,
                    seat: turn.to_act_seat,
                }
            }
        }
    }

    /// Record the last verdict and move to `Terminal`.
    fn close(
        &mut self,
        verdict: Verdict,
        last_turn: Option<Box<Turn>>,
        actions: Vec<ActionRecord>,
        summary: Option<Box<Summary>>,
    ) -> Applied {
        self.countdown.disarm();
        let Some(session) = self.session.as_mut() else {
            return Applied::Failed {
                error: SessionError::InactiveSession,
                retry: None,
            };
        };
        session.score = session.score.saturating_add(verdict.score_delta);
        session.log.extend(actions);
        if let (Progression::Hand { turn }, Some(last)) = (&mut session.progression, last_turn) {
            *turn = last;
        }
        session.last_verdict = Some(verdict.clone());
        let session_id = session.id.clone();

        self.phase = Phase::Terminal;
        Applied::Advanced {
            verdict,
            step: Step::Terminal {
                session_id,
                summary,
            },
        }
    }

    /// Keep the item/turn current after a failed resolution.
    fn fail(&mut self, error: SessionError) -> Applied {
        let human = match self.session.as_ref().map(|s| &s.progression) {
            Some(Progression::Training { .. }) => true,
            Some(Progression::Hand { turn }) => turn.hero_to_act(),
            None => false,
        };
        let retry = if human {
            Some(self.enter_current())
        } else {
            None
        };
        Applied::Failed { error, retry }
    }
}
