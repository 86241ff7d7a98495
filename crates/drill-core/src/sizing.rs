//! Advisory bet sizing.
//!
//! Proposed amounts are offered to the hero as shortcut buttons. They are
//! never sent without an explicit selection, and the authority validates
//! whatever amount is finally submitted.

use crate::protocol::{Action, Turn};

/// Smallest chip increment, in big blinds.
pub const MIN_UNIT_BB: f64 = 0.5;

// Guards floor() against representation error, e.g. 1.5 / 0.5 = 2.9999...
const EPSILON: f64 = 1e-9;

/// How the scaled pot is snapped to the increment grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Rounding {
    /// Round down to the increment below.
    #[default]
    Floor,
    /// Round to the closest increment.
    Nearest,
}

/// Proposed total commitment for a pot-fraction bet:
/// `max(min_unit, floor(pot * scale / min_unit) * min_unit + to_call)`.
pub fn proposed_commitment(pot: f64, to_call: f64, scale: f64, min_unit: f64) -> f64 {
    Sizing::new(min_unit).propose(pot, to_call, scale)
}

/// A sizing policy: increment plus rounding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sizing {
    pub min_unit: f64,
    pub rounding: Rounding,
}

impl Default for Sizing {
    fn default() -> Self {
        Self::new(MIN_UNIT_BB)
    }
}

impl Sizing {
    pub fn new(min_unit: f64) -> Self {
        Self {
            min_unit,
            rounding: Rounding::Floor,
        }
    }

    pub fn with_rounding(mut self, rounding: Rounding) -> Self {
        self.rounding = rounding;
        self
    }

    /// Compute the proposed total for `scale` times the pot on top of the
    /// outstanding call.
    pub fn propose(&self, pot: f64, to_call: f64, scale: f64) -> f64 {
        let units = pot.max(0.0) * scale / self.min_unit;
        let snapped = match self.rounding {
            Rounding::Floor => (units + EPSILON).floor(),
            Rounding::Nearest => units.round(),
        };
        (snapped * self.min_unit + to_call.max(0.0)).max(self.min_unit)
    }
}

/// A preset sizing button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BetPreset {
    /// A percentage of the current pot.
    Pot(u32),
}

/// The presets offered during hand simulation.
pub const BET_PRESETS: &[BetPreset] = &[BetPreset::Pot(33), BetPreset::Pot(75), BetPreset::Pot(125)];

impl BetPreset {
    pub fn label(self) -> String {
        match self {
            BetPreset::Pot(pct) => format!("{pct}% pot"),
        }
    }

    /// Fraction of the pot this preset represents.
    pub fn scale(self) -> f64 {
        match self {
            BetPreset::Pot(pct) => f64::from(pct) / 100.0,
        }
    }

    /// Proposed amount for this preset on the given turn.
    pub fn amount(self, turn: &Turn, sizing: &Sizing) -> f64 {
        sizing.propose(turn.pot, turn.hero_to_call(), self.scale())
    }
}

/// The legal action a sized bet is submitted as: `bet` when the turn allows
/// one, otherwise `raise`. `None` if neither is legal.
pub fn sizing_action(turn: &Turn) -> Option<Action> {
    ["bet", "raise"]
        .into_iter()
        .map(Action::new)
        .find(|a| turn.has_action(a))
}

/// A preset resolved against the current turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposedBet {
    pub preset: BetPreset,
    pub action: Action,
    pub amount: f64,
}

/// All presets for `turn`. Empty when the pot is empty, since there is
/// nothing to scale, or when the hero can neither bet nor raise.
pub fn proposals(turn: &Turn, sizing: &Sizing) -> Vec<ProposedBet> {
    if turn.pot <= 0.0 {
        return Vec::new();
    }
    let Some(action) = sizing_action(turn) else {
        return Vec::new();
    };
    BET_PRESETS
        .iter()
        .map(|&preset| ProposedBet {
            preset,
            action: action.clone(),
            amount: preset.amount(turn, sizing),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Player, Street};

    fn turn(pot: f64, current_bet: f64, hero_committed: f64, legal: &[&str]) -> Turn {
        Turn {
            street: Street::Flop,
            players: vec![Player {
                seat: 0,
                position: "BB".to_string(),
                stack: 90.0,
                committed_this_street: hero_committed,
                total_committed: 10.0,
                in_hand: true,
                is_hero: true,
                is_active: true,
                hole_cards: None,
            }],
            button_seat: 3,
            pot,
            current_bet,
            community_cards: vec!["As".into(), "7d".into(), "2c".into()],
            to_act_seat: Some(0),
            hero_seat: 0,
            hero_cards: Vec::new(),
            min_raise_to: None,
            legal_actions: legal.iter().map(|&a| Action::new(a)).collect(),
            key_spot: None,
        }
    }

    #[test]
    fn floor_policy_follows_formula() {
        assert_eq!(proposed_commitment(10.0, 0.0, 0.33, 0.5), 3.0);
        assert_eq!(proposed_commitment(10.0, 0.0, 0.75, 0.5), 7.5);
        assert_eq!(proposed_commitment(10.0, 0.0, 1.25, 0.5), 12.5);
        assert_eq!(proposed_commitment(3.0, 0.0, 0.5, 0.5), 1.5);
    }

    #[test]
    fn nearest_policy_rounds_up_past_half() {
        let sizing = Sizing::new(0.5).with_rounding(Rounding::Nearest);
        assert_eq!(sizing.propose(10.0, 0.0, 0.33), 3.5);
        assert_eq!(sizing.propose(10.0, 0.0, 0.31), 3.0);
    }

    #[test]
    fn empty_pot_yields_min_unit() {
        for scale in [0.33, 0.75, 1.25] {
            assert_eq!(proposed_commitment(0.0, 0.0, scale, 0.5), 0.5);
            assert_eq!(proposed_commitment(0.0, 0.0, scale, 1.0), 1.0);
        }
    }

    #[test]
    fn outstanding_call_is_added() {
        assert_eq!(proposed_commitment(12.0, 4.0, 0.75, 0.5), 13.0);
    }

    #[test]
    fn pure_for_identical_inputs() {
        let a = proposed_commitment(7.3, 1.1, 1.25, 0.5);
        let b = proposed_commitment(7.3, 1.1, 1.25, 0.5);
        assert_eq!(a, b);
    }

    #[test]
    fn presets_follow_turn() {
        let sizing = Sizing::default();
        let open = proposals(&turn(6.0, 0.0, 0.0, &["check", "bet"]), &sizing);
        assert_eq!(open.len(), 3);
        assert!(open.iter().all(|p| p.action.as_str() == "bet"));
        assert_eq!(open[1].amount, 4.5);

        let facing = proposals(&turn(10.0, 4.0, 1.0, &["fold", "call", "raise"]), &sizing);
        assert_eq!(facing[1].action.as_str(), "raise");
        assert_eq!(facing[1].amount, 10.5);

        assert!(proposals(&turn(0.0, 0.0, 0.0, &["check", "bet"]), &sizing).is_empty());
        assert_eq!(BetPreset::Pot(125).label(), "125% pot");
    }

    #[test]
    fn presets_only_use_legal_actions() {
        let sizing = Sizing::default();
        let facing = turn(10.0, 4.0, 1.0, &["fold", "call", "raise"]);
        let offered = proposals(&facing, &sizing);
        assert!(!offered.is_empty());
        assert!(offered.iter().all(|p| facing.has_action(&p.action)));

        let passive = turn(10.0, 0.0, 0.0, &["check", "fold"]);
        assert!(proposals(&passive, &sizing).is_empty());
        assert_eq!(sizing_action(&passive), None);
    }
}
