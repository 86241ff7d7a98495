//! Data model and wire shapes exchanged with the strategy authority.
//!
//! Everything here is plain data: the authority owns legality, scoring and
//! the game state, the client only mirrors what it is told. The one place
//! the wire format is reshaped on the client side is
//! [`ResolveTurnResponse`] → [`Resolution`], which turns the flat
//! optional-field reply into a tagged progress/completion variant.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Countdown used when an item does not carry its own time limit.
pub const DEFAULT_TIME_BUDGET_SECS: u32 = 10;

/// Reserved action sent when the human did not answer in time.
pub const TIMEOUT_ACTION: &str = "timeout";

/// Placeholder action sent on behalf of a non-human seat. The authority
/// decides what that seat actually does.
pub const AUTOPLAY_ACTION: &str = "check";

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Opaque session identifier issued by the authority.
///
/// The authority may send ids as JSON numbers or strings; both are accepted
/// and kept as text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(u64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Number(n) => SessionId(n.to_string()),
            RawId::Text(s) => SessionId(s),
        })
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// An action name as understood by the authority (`"fold"`, `"raise_2bb"`,
/// `"bet75"`, ...).
///
/// The legal set is always supplied by the authority, so actions are kept
/// as open strings rather than a closed enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action(String);

impl Action {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The reserved "failed to respond in time" sentinel.
    pub fn timeout() -> Self {
        Self(TIMEOUT_ACTION.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_timeout(&self) -> bool {
        self.0 == TIMEOUT_ACTION
    }

    /// Human-readable label for display.
    pub fn label(&self) -> String {
        let known = match self.0.as_str() {
            "fold" => "Fold",
            "check" => "Check",
            "call" => "Call",
            "limp" => "Limp",
            "bet" => "Bet",
            "raise" => "Raise",
            "allin" | "all_in" | "raise_all_in" => "All-In",
            "raise_2bb" => "Raise to 2BB",
            "raise_2.5bb" => "Raise to 2.5BB",
            "raise_3bb" => "Raise to 3BB",
            "raise_4bb" => "Raise to 4BB",
            "raise_3x" => "3-Bet (3x)",
            "bet33" => "Bet 33% pot",
            "bet75" | "raise75" => "75% pot",
            "bet125" | "raise125" => "125% pot",
            "sb" => "Small blind",
            "bb" => "Big blind",
            "timeout" => "Timed out",
            _ => return self.0.clone(),
        };
        known.to_string()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Action {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ---------------------------------------------------------------------------
// Table vocabulary
// ---------------------------------------------------------------------------

/// Six-max seat position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Position {
    Utg,
    Mp,
    Co,
    Btn,
    Sb,
    Bb,
}

impl Position {
    pub const ALL: [Position; 6] = [
        Position::Utg,
        Position::Mp,
        Position::Co,
        Position::Btn,
        Position::Sb,
        Position::Bb,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Position::Utg => "UTG",
            Position::Mp => "MP",
            Position::Co => "CO",
            Position::Btn => "BTN",
            Position::Sb => "SB",
            Position::Bb => "BB",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Position::ALL
            .into_iter()
            .find(|p| p.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown position '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Street {
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
}

impl fmt::Display for Street {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Street::Preflop => "Preflop",
            Street::Flop => "Flop",
            Street::Turn => "Turn",
            Street::River => "River",
            Street::Showdown => "Showdown",
        })
    }
}

/// Which kind of session a config, quota or summary refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Training,
    Hand,
}

// ---------------------------------------------------------------------------
// Training items
// ---------------------------------------------------------------------------

/// One timed decision in a training session. Immutable once issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: u64,
    /// Hand class, e.g. `"AKs"` or `"72o"`.
    pub hand: String,
    pub position: String,
    #[serde(default)]
    pub vs_position: Option<String>,
    pub action_to_you: String,
    /// Legal answers, already shuffled by the authority.
    pub options: Vec<Action>,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    /// Seconds allowed to answer.
    #[serde(default)]
    pub time_limit: Option<u32>,
}

impl Item {
    /// The item's own countdown, if it carries a positive limit.
    pub fn time_budget(&self) -> Option<u32> {
        self.time_limit.filter(|&secs| secs > 0)
    }
}

// ---------------------------------------------------------------------------
// Hand simulation turns
// ---------------------------------------------------------------------------

/// A seat at the simulated table. Stack and commitment figures come from
/// the authority only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub seat: u8,
    pub position: String,
    pub stack: f64,
    pub committed_this_street: f64,
    pub total_committed: f64,
    pub in_hand: bool,
    pub is_hero: bool,
    /// Can still act on this street.
    #[serde(default)]
    pub is_active: bool,
    /// Only ever present for the hero.
    #[serde(default)]
    pub hole_cards: Option<Vec<String>>,
}

/// Key-spot annotation attached to a turn the authority grades in depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeySpot {
    pub street: Street,
    pub context_id: String,
    #[serde(default)]
    pub pot_type: Option<String>,
    #[serde(default)]
    pub ip_oop: Option<String>,
    #[serde(default)]
    pub spr_bucket: Option<String>,
    #[serde(default)]
    pub board: Vec<String>,
    pub hero_hand: String,
    #[serde(default)]
    pub hero_hand_bucket: Option<String>,
    pub legal_actions: Vec<Action>,
    /// Full strategy is only sent to subscribed users.
    #[serde(default)]
    pub strategy: Option<BTreeMap<String, f64>>,
    pub best_action: Action,
}

/// Authoritative snapshot of a hand in progress.
///
/// A new snapshot replaces the previous one wholesale after every
/// resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub street: Street,
    pub players: Vec<Player>,
    #[serde(default)]
    pub button_seat: u8,
    pub pot: f64,
    pub current_bet: f64,
    #[serde(default)]
    pub community_cards: Vec<String>,
    /// Seat that must move next, absent once nobody can act.
    #[serde(default)]
    pub to_act_seat: Option<u8>,
    pub hero_seat: u8,
    #[serde(default)]
    pub hero_cards: Vec<String>,
    #[serde(default)]
    pub min_raise_to: Option<f64>,
    /// Legal actions for the seat to act.
    #[serde(default)]
    pub legal_actions: Vec<Action>,
    #[serde(default)]
    pub key_spot: Option<KeySpot>,
}

impl Turn {
    /// Returns true if the hero is the seat to act.
    pub fn hero_to_act(&self) -> bool {
        self.to_act_seat == Some(self.hero_seat)
    }

    pub fn hero(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.seat == self.hero_seat)
    }

    /// What the hero still owes to match the current bet.
    pub fn hero_to_call(&self) -> f64 {
        let committed = self.hero().map(|p| p.committed_this_street).unwrap_or(0.0);
        (self.current_bet - committed).max(0.0)
    }

    pub fn has_action(&self, action: &Action) -> bool {
        self.legal_actions.contains(action)
    }
}

/// One entry of the append-only hand log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub street: Street,
    pub seat: u8,
    pub position: String,
    pub action: Action,
    #[serde(default)]
    pub amount: Option<f64>,
    pub pot_after: f64,
}

// ---------------------------------------------------------------------------
// Grading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Grade {
    Perfect,
    Acceptable,
    Wrong,
}

impl Grade {
    pub fn label(self) -> &'static str {
        match self {
            Grade::Perfect => "Perfect",
            Grade::Acceptable => "Acceptable",
            Grade::Wrong => "Wrong",
        }
    }
}

/// The authority's judgement of one submitted action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    #[serde(default)]
    pub correct: Option<bool>,
    #[serde(default)]
    pub grade: Option<Grade>,
    #[serde(default)]
    pub user_action: Option<Action>,
    #[serde(default)]
    pub correct_action: Option<Action>,
    /// Canonical action frequencies (action → 0.0..=1.0).
    #[serde(default)]
    pub distribution: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub score_delta: u32,
    #[serde(default)]
    pub time_bonus: bool,
    #[serde(default)]
    pub explanation: Option<String>,
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Per-item line of a training summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub hand: String,
    pub position: String,
    #[serde(default)]
    pub vs_position: Option<String>,
    pub action_to_you: String,
    pub user_action: Action,
    pub correct_action: Action,
    pub is_correct: bool,
    #[serde(default)]
    pub response_time_ms: Option<u64>,
}

/// Grading of one hero decision in a simulated hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotReview {
    pub street: Street,
    pub context_id: String,
    pub user_action: Action,
    pub best_action: Action,
    pub grade: Grade,
    #[serde(default)]
    pub strategy: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    pub user_action_prob: Option<f64>,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Structured review of a finished hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandReview {
    pub result_bb: f64,
    pub ended_by: String,
    #[serde(default)]
    pub action_log: Vec<ActionRecord>,
    #[serde(default)]
    pub spots: Vec<SpotReview>,
}

/// Terminal report for a finished session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub session_id: SessionId,
    pub total: u32,
    #[serde(default)]
    pub correct: Option<u32>,
    /// Percentage, 0–100.
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub records: Vec<ItemRecord>,
    #[serde(default)]
    pub review: Option<HandReview>,
    #[serde(default)]
    pub can_replay: bool,
    /// Sequence id to pass to a replay request when `can_replay` is set.
    #[serde(default)]
    pub replay_id: Option<String>,
}

impl Summary {
    pub fn incorrect(&self) -> Option<u32> {
        self.correct.map(|c| self.total.saturating_sub(c))
    }

    /// Accuracy as reported, or derived from the correct count.
    pub fn accuracy_pct(&self) -> Option<f64> {
        self.accuracy.or_else(|| match (self.correct, self.total) {
            (Some(c), t) if t > 0 => Some(f64::from(c) * 100.0 / f64::from(t)),
            _ => None,
        })
    }

    /// The id to replay, if the authority allows it.
    pub fn replay_target(&self) -> Option<&str> {
        if self.can_replay {
            self.replay_id.as_deref()
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Start / resolve exchanges
// ---------------------------------------------------------------------------

/// What the factory call produced: either the full item sequence or the
/// first turn of a hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionPlan {
    Training { items: Vec<Item> },
    Hand { turn: Turn },
}

impl SessionPlan {
    pub fn kind(&self) -> SessionKind {
        match self {
            SessionPlan::Training { .. } => SessionKind::Training,
            SessionPlan::Hand { .. } => SessionKind::Hand,
        }
    }
}

/// Reply to `StartSession` and `ReplayTurnSequence`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartedSession {
    pub session_id: SessionId,
    pub plan: SessionPlan,
    #[serde(default)]
    pub time_budget_per_item: Option<u32>,
}

/// Body of a `ResolveTurn` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub session_id: SessionId,
    /// Position of the item/turn in the session (0-based).
    pub turn_index: u32,
    /// Authority-side id of the training item, when there is one.
    #[serde(default)]
    pub item_id: Option<u64>,
    pub action: Action,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub response_time_ms: Option<u64>,
}

/// Flat wire reply to `ResolveTurn`.
///
/// Convert with [`Resolution::from`] before acting on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolveTurnResponse {
    #[serde(flatten)]
    pub verdict: Verdict,
    #[serde(default)]
    pub next_turn: Option<Turn>,
    /// Log entries produced by this resolution.
    #[serde(default)]
    pub actions: Vec<ActionRecord>,
    #[serde(default)]
    pub complete: bool,
    #[serde(default)]
    pub summary: Option<Summary>,
}

/// A resolution as the session engine consumes it.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The sequence continues. Hand sessions carry the next snapshot;
    /// training sessions move to the next issued item.
    Progress {
        verdict: Verdict,
        next_turn: Option<Box<Turn>>,
        actions: Vec<ActionRecord>,
    },
    /// The sequence is closed.
    Completion {
        verdict: Verdict,
        final_turn: Option<Box<Turn>>,
        actions: Vec<ActionRecord>,
        summary: Option<Box<Summary>>,
    },
}

impl Resolution {
    pub fn verdict(&self) -> &Verdict {
        match self {
            Resolution::Progress { verdict, .. } | Resolution::Completion { verdict, .. } => {
                verdict
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Resolution::Completion { .. })
    }
}

impl From<ResolveTurnResponse> for Resolution {
    fn from(r: ResolveTurnResponse) -> Self {
        if r.complete {
            Resolution::Completion {
                verdict: r.verdict,
                final_turn: r.next_turn.map(Box::new),
                actions: r.actions,
                summary: r.summary.map(Box::new),
            }
        } else {
            Resolution::Progress {
                verdict: r.verdict,
                next_turn: r.next_turn.map(Box::new),
                actions: r.actions,
            }
        }
    }
}

/// Remaining allowance reported by the entitlement collaborator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    #[serde(default)]
    pub remaining: Option<u32>,
    #[serde(default)]
    pub unlimited: bool,
}

impl Quota {
    pub fn allows_start(&self) -> bool {
        self.unlimited || self.remaining.is_none_or(|n| n > 0)
    }
}

/// Error body returned by the authority on non-2xx replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}
