//! Combat errors
//!
//! Every variant is a recoverable, structured failure returned to the caller.
//! Corrupted session state is a bug and asserts instead.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-turn and per-character pools an action can exhaust
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Actions,
    BonusActions,
    Reactions,
    Movement,
    Mana,
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Resource::Actions => "actions",
            Resource::BonusActions => "bonus actions",
            Resource::Reactions => "reactions",
            Resource::Movement => "movement",
            Resource::Mana => "mana",
        };
        write!(f, "{}", s)
    }
}

/// Errors returned by combat operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CombatError {
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("it's not {0}'s turn")]
    NotYourTurn(String),

    #[error("not enough {resource} (need {needed}, have {available})")]
    InsufficientResource {
        resource: Resource,
        needed: i64,
        available: i64,
    },

    #[error("combat session not found: {0}")]
    SessionNotFound(String),

    #[error("combat session has already ended")]
    SessionEnded,

    #[error("combat session {0} is already processing an action")]
    SessionBusy(String),

    #[error("{0} cannot act")]
    Incapacitated(String),

    #[error("combat needs living participants from at least two factions")]
    NoOpposition,

    #[error("duplicate participant: {0}")]
    DuplicateParticipant(String),
}

impl CombatError {
    pub(crate) fn insufficient(
        resource: Resource,
        needed: impl Into<i64>,
        available: impl Into<i64>,
    ) -> Self {
        CombatError::InsufficientResource {
            resource,
            needed: needed.into(),
            available: available.into(),
        }
    }
}
