//! Session driver.
//!
//! A single task owns the [`SessionMachine`] and every timer around it.
//! Frontends talk to it through a cloneable [`SessionHandle`] and watch the
//! [`SessionEvent`] stream:
//!
//! 1. [`spawn`] the driver over an [`Authority`].
//! 2. Call [`SessionHandle::start`] (or [`SessionHandle::replay`]).
//! 3. Answer [`SessionEvent::AwaitingInput`] with [`SessionHandle::submit`]
//!    or [`SessionHandle::bet`].
//! 4. Read the summary from [`SessionEvent::Completed`].
//!
//! Authority round trips run on background tasks and report back to the
//! driver loop, so cancelling is never blocked by a slow reply.

use std::sync::Arc;

use drill_core::config::SessionConfig;
use drill_core::protocol::{
    Action, ActionRecord, Item, ResolveRequest, SessionId, SessionKind, StartedSession, Summary,
    Turn, Verdict,
};
use drill_core::sizing::{BetPreset, ProposedBet};
use tokio::sync::{mpsc, oneshot};

use crate::authority::{Authority, AuthorityError};
use crate::autoplay::AutoPlayScheduler;
use crate::clock::Clock;
use crate::config::ClientConfig;
use crate::events::SessionEvent;
use crate::resolver::{ResolutionClient, Resolved};
use crate::session_state::{
    Applied, Phase, SessionError, SessionMachine, Step, SubmitOrigin, Tick, TurnKey,
};
use crate::summary::{SummaryAggregator, Terminal};

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Read-only copy of the driver's view, for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub phase: Phase,
    /// A start or replay is waiting on the authority.
    pub starting: bool,
    pub session_id: Option<SessionId>,
    pub kind: Option<SessionKind>,
    pub index: Option<u32>,
    pub total: Option<usize>,
    pub pending: bool,
    pub score: u32,
    pub remaining_secs: Option<u32>,
    pub legal_actions: Vec<Action>,
    pub item: Option<Item>,
    pub turn: Option<Turn>,
    pub log: Vec<ActionRecord>,
    pub last_verdict: Option<Verdict>,
    pub bet_proposals: Vec<ProposedBet>,
    pub summary: Option<Summary>,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

enum Command {
    Start {
        config: SessionConfig,
        reply: Reply<SessionId>,
    },
    Replay {
        reply: Reply<SessionId>,
    },
    Submit {
        action: Action,
        amount: Option<f64>,
        reply: Reply<()>,
    },
    Bet {
        preset: BetPreset,
        reply: Reply<()>,
    },
    Resume {
        reply: Reply<()>,
    },
    RetrySummary {
        reply: Reply<()>,
    },
    Cancel {
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

/// Cloneable front door of a running driver.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl SessionHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(make(reply)).map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Validate `config`, start a session and load its first item/turn.
    /// Anything current is cancelled first.
    ///
    /// Resolves once the authority has answered. A start superseded by a
    /// cancel or another start resolves to [`SessionError::StaleRequest`].
    pub async fn start(&self, config: SessionConfig) -> Result<SessionId, SessionError> {
        self.request(|reply| Command::Start { config, reply })
            .await?
    }

    /// Deal the finished session's sequence again.
    pub async fn replay(&self) -> Result<SessionId, SessionError> {
        self.request(|reply| Command::Replay { reply }).await?
    }

    /// Answer the current item/turn.
    pub async fn submit(&self, action: Action, amount: Option<f64>) -> Result<(), SessionError> {
        self.request(|reply| Command::Submit {
            action,
            amount,
            reply,
        })
        .await?
    }

    /// Answer the current hand turn with a pot-fraction sizing.
    pub async fn bet(&self, preset: BetPreset) -> Result<(), SessionError> {
        self.request(|reply| Command::Bet { preset, reply }).await?
    }

    /// Re-offer the current turn after a failed resolution.
    pub async fn resume(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Resume { reply }).await?
    }

    pub async fn retry_summary(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::RetrySummary { reply }).await?
    }

    pub async fn cancel(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Cancel { reply }).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }
}

/// Spawn a driver on the current runtime.
///
/// The driver stops when every [`SessionHandle`] has been dropped.
pub fn spawn<A: Authority>(
    authority: A,
    config: ClientConfig,
) -> (SessionHandle, mpsc::UnboundedReceiver<SessionEvent>) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let driver = SessionDriver::new(Arc::new(authority), config, cmd_rx, event_tx);
    tokio::spawn(driver.run());
    (SessionHandle { tx: cmd_tx }, event_rx)
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

enum Launch {
    Fresh(SessionConfig),
    Replay(String),
}

struct StartDone {
    generation: u64,
    outcome: Result<StartedSession, SessionError>,
}

struct Fetched {
    session_id: SessionId,
    outcome: Result<Summary, AuthorityError>,
}

struct PendingStart {
    reply: Reply<SessionId>,
}

struct SessionDriver<A> {
    authority: Arc<A>,
    config: ClientConfig,
    machine: SessionMachine,
    resolver: ResolutionClient<A>,
    autoplay: AutoPlayScheduler,
    summary: SummaryAggregator,
    clock: Clock,
    events: mpsc::UnboundedSender<SessionEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
    resolved_rx: mpsc::UnboundedReceiver<Resolved>,
    autoplay_rx: mpsc::UnboundedReceiver<TurnKey>,
    start_tx: mpsc::UnboundedSender<StartDone>,
    start_rx: mpsc::UnboundedReceiver<StartDone>,
    fetch_tx: mpsc::UnboundedSender<Fetched>,
    fetch_rx: mpsc::UnboundedReceiver<Fetched>,
    /// Bumped on every start and cancel; start replies from older
    /// generations are dropped.
    start_generation: u64,
    pending_start: Option<PendingStart>,
}

impl<A: Authority> SessionDriver<A> {
    fn new(
        authority: Arc<A>,
        config: ClientConfig,
        commands: mpsc::UnboundedReceiver<Command>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let (resolved_tx, resolved_rx) = mpsc::unbounded_channel();
        let (autoplay_tx, autoplay_rx) = mpsc::unbounded_channel();
        let (start_tx, start_rx) = mpsc::unbounded_channel();
        let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();
        Self {
            resolver: ResolutionClient::new(Arc::clone(&authority), resolved_tx),
            autoplay: AutoPlayScheduler::new(config.settle_delay, autoplay_tx),
            clock: Clock::new(config.tick_interval),
            machine: SessionMachine::new(config.clone()),
            summary: SummaryAggregator::new(),
            authority,
            config,
            events,
            commands,
            resolved_rx,
            autoplay_rx,
            start_tx,
            start_rx,
            fetch_tx,
            fetch_rx,
            start_generation: 0,
            pending_start: None,
        }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                Some(resolved) = self.resolved_rx.recv() => self.on_resolved(resolved),
                Some(done) = self.start_rx.recv() => self.on_started(done),
                Some(fetched) = self.fetch_rx.recv() => self.on_fetched(fetched),
                Some(key) = self.autoplay_rx.recv() => self.on_autoplay_due(key),
                _ = self.clock.tick() => self.on_tick(),
            }
        }
        self.autoplay.cancel();
        tracing::debug!("session driver stopped");
    }

    fn emit(&self, event: SessionEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Start { config, reply } => {
                if let Err(e) = config.validate() {
                    tracing::warn!(error = %e, "session config rejected");
                    let _ = reply.send(Err(SessionError::Validation(e)));
                    return;
                }
                self.launch(Launch::Fresh(config), reply);
            }
            Command::Replay { reply } => match self.summary.replay_target() {
                Ok(sequence_id) => self.launch(Launch::Replay(sequence_id), reply),
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
            Command::Submit {
                action,
                amount,
                reply,
            } => {
                let _ = reply.send(self.submit(action, amount));
            }
            Command::Bet { preset, reply } => {
                let _ = reply.send(self.bet(preset));
            }
            Command::Resume { reply } => {
                let _ = reply.send(self.resume());
            }
            Command::RetrySummary { reply } => {
                let _ = reply.send(self.retry_summary());
            }
            Command::Cancel { reply } => {
                self.cancel();
                let _ = reply.send(());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    // -- lifecycle --------------------------------------------------------

    /// Drop whatever is current. Returns true if a session or a start was
    /// actually abandoned.
    fn abandon(&mut self) -> bool {
        let mut abandoned = self.machine.phase() == Phase::Active;
        if let Some(pending) = self.pending_start.take() {
            let _ = pending.reply.send(Err(SessionError::StaleRequest));
            abandoned = true;
        }
        self.start_generation += 1;
        self.machine.cancel();
        self.autoplay.cancel();
        self.summary.reset();
        abandoned
    }

    fn cancel(&mut self) {
        if self.abandon() {
            tracing::info!("session cancelled");
            self.emit(SessionEvent::Cancelled);
        }
    }

    fn launch(&mut self, launch: Launch, reply: Reply<SessionId>) {
        if self.abandon() {
            tracing::info!("current session replaced");
            self.emit(SessionEvent::Cancelled);
        }
        let generation = self.start_generation;
        self.pending_start = Some(PendingStart { reply });

        let authority = Arc::clone(&self.authority);
        let tx = self.start_tx.clone();
        let check_quota = self.config.check_quota;
        tokio::spawn(async move {
            let outcome = match launch {
                Launch::Fresh(config) => open_session(&*authority, &config, check_quota).await,
                Launch::Replay(sequence_id) => {
                    tracing::info!(sequence = %sequence_id, "replaying sequence");
                    authority
                        .replay_turn_sequence(&sequence_id)
                        .await
                        .map_err(SessionError::Start)
                }
            };
            let _ = tx.send(StartDone {
                generation,
                outcome,
            });
        });
    }

    fn on_started(&mut self, done: StartDone) {
        if done.generation != self.start_generation {
            tracing::debug!(generation = done.generation, "discarding superseded start");
            return;
        }
        let Some(pending) = self.pending_start.take() else {
            return;
        };

        let started = match done.outcome {
            Ok(started) => started,
            Err(e) => {
                tracing::warn!(error = %e, "session start failed");
                let _ = pending.reply.send(Err(e));
                return;
            }
        };

        let session_id = started.session_id.clone();
        let kind = started.plan.kind();
        match self.machine.begin(started) {
            Ok(step) => {
                tracing::info!(session = %session_id, ?kind, "session started");
                self.emit(SessionEvent::Started {
                    session_id: session_id.clone(),
                    kind,
                    total: self.machine.total_items(),
                });
                let _ = pending.reply.send(Ok(session_id));
                self.follow(step);
            }
            Err(e) => {
                tracing::warn!(session = %session_id, error = %e, "unusable session");
                let _ = pending.reply.send(Err(e));
            }
        }
    }

    // -- turns ------------------------------------------------------------

    /// Act on what the machine says comes next.
    fn follow(&mut self, step: Step) {
        match step {
            Step::AwaitHuman { key, budget_secs } => {
                if budget_secs.is_some() {
                    self.clock.reset();
                }
                if let Some(spot) = self.machine.current_turn().and_then(|t| t.key_spot.clone()) {
                    tracing::debug!(index = key.index, context = %spot.context_id, "key spot");
                    self.emit(SessionEvent::KeySpot {
                        index: key.index,
                        spot,
                    });
                }
                self.emit(SessionEvent::AwaitingInput {
                    index: key.index,
                    budget_secs,
                    legal_actions: self.machine.legal_actions().to_vec(),
                });
            }
            Step::AutoPlay { key, seat } => {
                tracing::debug!(index = key.index, ?seat, "scheduling auto-play");
                self.autoplay.schedule(key);
                self.emit(SessionEvent::AutoPlayScheduled {
                    index: key.index,
                    seat,
                    delay: self.autoplay.delay(),
                });
            }
            Step::Terminal {
                session_id,
                summary,
            } => {
                tracing::info!(session = %session_id, score = self.machine.score(), "sequence closed");
                match self.summary.on_terminal(session_id, summary) {
                    Terminal::Adopted => self.complete(),
                    Terminal::Fetch(session_id) => self.fetch_summary(session_id),
                }
            }
        }
    }

    fn submit(&mut self, action: Action, amount: Option<f64>) -> Result<(), SessionError> {
        let request = self
            .machine
            .submit(action, amount)
            .inspect_err(|e| tracing::warn!(error = %e, "submission refused"))?;
        self.send_resolution(SubmitOrigin::Human, request);
        Ok(())
    }

    fn bet(&mut self, preset: BetPreset) -> Result<(), SessionError> {
        if self.machine.phase() != Phase::Active {
            return Err(SessionError::InactiveSession);
        }
        if self.machine.current_turn().is_none() {
            return Err(SessionError::InvalidAction(
                "bet presets need a hand turn".to_string(),
            ));
        }
        let proposal = self
            .machine
            .bet_proposals(&self.config.sizing)
            .into_iter()
            .find(|p| p.preset == preset);
        match proposal {
            Some(p) => self.submit(p.action, Some(p.amount)),
            None => Err(SessionError::InvalidAction(format!(
                "{} is not available now",
                preset.label()
            ))),
        }
    }

    fn send_resolution(&mut self, origin: SubmitOrigin, request: ResolveRequest) {
        let Some(key) = self.machine.current_key() else {
            return;
        };
        tracing::info!(
            index = request.turn_index,
            action = %request.action,
            amount = ?request.amount,
            ?origin,
            "submitting"
        );
        self.emit(SessionEvent::Submitted {
            index: request.turn_index,
            action: request.action.clone(),
            amount: request.amount,
            origin,
        });
        self.resolver.dispatch(key, origin, request);
    }

    fn on_tick(&mut self) {
        match self.machine.on_tick() {
            Tick::Idle => {}
            Tick::Remaining { key, remaining } => {
                self.emit(SessionEvent::Countdown {
                    index: key.index,
                    remaining,
                });
            }
            Tick::TimedOut(request) => {
                tracing::info!(index = request.turn_index, "countdown expired");
                self.send_resolution(SubmitOrigin::Timeout, request);
            }
        }
    }

    fn on_autoplay_due(&mut self, key: TurnKey) {
        if !self.autoplay.take_due(key) {
            return;
        }
        if let Some(request) = self.machine.auto_play(key) {
            self.send_resolution(SubmitOrigin::AutoPlay, request);
        }
    }

    fn on_resolved(&mut self, resolved: Resolved) {
        let Resolved {
            key,
            origin,
            outcome,
        } = resolved;
        match self.machine.apply_resolution(key, outcome) {
            Ok(Applied::Advanced { verdict, step }) => {
                tracing::info!(
                    index = key.index,
                    correct = ?verdict.correct,
                    score = self.machine.score(),
                    "resolved"
                );
                self.emit(SessionEvent::Resolved {
                    index: key.index,
                    verdict,
                });
                self.follow(step);
            }
            Ok(Applied::Failed { error, retry }) => {
                tracing::warn!(index = key.index, ?origin, error = %error, "resolution rejected");
                self.emit(SessionEvent::Rejected {
                    index: Some(key.index),
                    error,
                });
                if let Some(step) = retry {
                    self.follow(step);
                }
            }
            Err(e) => {
                tracing::debug!(epoch = key.epoch, index = key.index, error = %e, "discarding reply");
            }
        }
    }

    fn resume(&mut self) -> Result<(), SessionError> {
        if self.machine.phase() != Phase::Active {
            return Err(SessionError::InactiveSession);
        }
        if self.machine.is_pending() {
            return Err(SessionError::AlreadyPending);
        }
        let step = self.machine.resume().ok_or(SessionError::InactiveSession)?;
        self.follow(step);
        Ok(())
    }

    // -- summary ----------------------------------------------------------

    fn fetch_summary(&mut self, session_id: SessionId) {
        tracing::debug!(session = %session_id, "fetching summary");
        let authority = Arc::clone(&self.authority);
        let tx = self.fetch_tx.clone();
        tokio::spawn(async move {
            let outcome = authority.fetch_summary(&session_id).await;
            let _ = tx.send(Fetched {
                session_id,
                outcome,
            });
        });
    }

    fn on_fetched(&mut self, fetched: Fetched) {
        let outcome = self
            .summary
            .on_fetched(&fetched.session_id, fetched.outcome)
            .map(|_| ());
        match outcome {
            Ok(()) => self.complete(),
            Err(SessionError::StaleRequest) => {
                tracing::debug!(session = %fetched.session_id, "discarding stale summary");
            }
            Err(error) => self.emit(SessionEvent::SummaryFailed { error }),
        }
    }

    fn retry_summary(&mut self) -> Result<(), SessionError> {
        let session_id = self.summary.retry()?;
        self.fetch_summary(session_id);
        Ok(())
    }

    /// Expose the summary and drop the session's working state.
    fn complete(&mut self) {
        self.machine.close_out();
        if let Some(summary) = self.summary.summary() {
            self.emit(SessionEvent::Completed {
                summary: Box::new(summary.clone()),
            });
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        let m = &self.machine;
        SessionSnapshot {
            phase: m.phase(),
            starting: self.pending_start.is_some(),
            session_id: m.session_id().cloned(),
            kind: m.kind(),
            index: m.current_index(),
            total: m.total_items(),
            pending: m.is_pending(),
            score: m.score(),
            remaining_secs: m.countdown_remaining(),
            legal_actions: m.legal_actions().to_vec(),
            item: m.current_item().cloned(),
            turn: m.current_turn().cloned(),
            log: m.log().to_vec(),
            last_verdict: m.last_verdict().cloned(),
            bet_proposals: m.bet_proposals(&self.config.sizing),
            summary: self.summary.summary().cloned(),
        }
    }
}

/// Quota check, then `StartSession`.
async fn open_session<A: Authority>(
    authority: &A,
    config: &SessionConfig,
    check_quota: bool,
) -> Result<StartedSession, SessionError> {
    if check_quota {
        let quota = authority
            .quota(config.kind())
            .await
            .map_err(SessionError::Start)?;
        if !quota.allows_start() {
            tracing::info!(kind = ?config.kind(), "quota exhausted");
            return Err(SessionError::Start(AuthorityError::QuotaExceeded(
                "no sessions left today".to_string(),
            )));
        }
    }
    authority
        .start_session(config)
        .await
        .map_err(SessionError::Start)
}
