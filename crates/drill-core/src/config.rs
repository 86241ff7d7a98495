//! Session configurations sent to the authority's factory call, and the
//! local validation applied before any call is made.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::{Difficulty, Position, SessionKind};

/// Stack depths the training factory supports.
pub const TRAINING_STACKS_BB: [u32; 2] = [50, 100];

/// Upper bound on the number of items in one training session.
pub const MAX_ITEM_COUNT: u32 = 50;

/// Table formats the hand simulator supports.
pub const TABLE_TYPES: [&str; 2] = ["6max", "hu"];

pub const MIN_HAND_STACK_BB: u32 = 10;
pub const MAX_HAND_STACK_BB: u32 = 500;

/// A config rejected locally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("stack size must be one of {stacks:?} BB, got {0}", stacks = TRAINING_STACKS_BB)]
    TrainingStack(u32),
    #[error("item count must be between 1 and {max}, got {0}", max = MAX_ITEM_COUNT)]
    ItemCount(u32),
    #[error("action to you cannot be empty")]
    EmptyActionToYou,
    #[error("unknown table type '{0}'")]
    TableType(String),
    #[error("stack size must be between {min} and {max} BB, got {0}", min = MIN_HAND_STACK_BB, max = MAX_HAND_STACK_BB)]
    HandStack(u32),
}

/// Parameters for a preflop training session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub stack_bb: u32,
    pub position: Position,
    /// Situation facing the hero, e.g. `"open"` or `"vs_raise_2.5bb"`.
    pub action_to_you: String,
    pub item_count: u32,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            stack_bb: 100,
            position: Position::Btn,
            action_to_you: "open".to_string(),
            item_count: 10,
            difficulty: None,
        }
    }
}

/// AI opponent strength for hand simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiLevel {
    Easy,
    #[default]
    Standard,
    Hard,
}

/// Parameters for a single simulated hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandConfig {
    pub table_type: String,
    pub stack_bb: u32,
    #[serde(default)]
    pub ai_level: AiLevel,
}

impl Default for HandConfig {
    fn default() -> Self {
        Self {
            table_type: "6max".to_string(),
            stack_bb: 100,
            ai_level: AiLevel::Standard,
        }
    }
}

/// Argument of the `StartSession` factory call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionConfig {
    Training(TrainingConfig),
    Hand(HandConfig),
}

impl SessionConfig {
    pub fn kind(&self) -> SessionKind {
        match self {
            SessionConfig::Training(_) => SessionKind::Training,
            SessionConfig::Hand(_) => SessionKind::Hand,
        }
    }

    /// Reject configs the factory would refuse, before calling it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            SessionConfig::Training(cfg) => {
                if !TRAINING_STACKS_BB.contains(&cfg.stack_bb) {
                    return Err(ConfigError::TrainingStack(cfg.stack_bb));
                }
                if cfg.item_count == 0 || cfg.item_count > MAX_ITEM_COUNT {
                    return Err(ConfigError::ItemCount(cfg.item_count));
                }
                if cfg.action_to_you.trim().is_empty() {
                    return Err(ConfigError::EmptyActionToYou);
                }
            }
            SessionConfig::Hand(cfg) => {
                if !TABLE_TYPES.contains(&cfg.table_type.as_str()) {
                    return Err(ConfigError::TableType(cfg.table_type.clone()));
                }
                if !(MIN_HAND_STACK_BB..=MAX_HAND_STACK_BB).contains(&cfg.stack_bb) {
                    return Err(ConfigError::HandStack(cfg.stack_bb));
                }
            }
        }
        Ok(())
    }
}
