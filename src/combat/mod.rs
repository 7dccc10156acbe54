//! Combat rules engine
//!
//! Implements d20-style checks and turn-based combat with:
//! - Dice rolling (e.g., "2d6+3") from an injectable random source
//! - Modifier aggregation and a bounded contextual bias
//! - Initiative, turns, rounds and per-round resource pools
//! - Attacks, spells, movement with opportunity attacks, dodge/help/hide
//! - Status conditions with durations, periodic effects and saves
//!
//! [`Engine`] holds no session state. Every operation takes the session
//! value it works on, so independent sessions never interact.

mod actions;
mod adjust;
mod check;
mod conditions;
mod dice;
mod error;
mod narrative;
mod session;
mod skills;

pub use actions::{Action, ActionOutcome, AttackReport, CastingTime, Spell};
pub use adjust::outcome_bias;
pub use check::{
    AggregatedModifiers, CheckKind, CheckResult, ModifierCondition, ModifierKind, RuleCheck,
    RuleModifier,
};
pub use conditions::{
    ConditionKind, ConditionRegistry, ConditionSet, Duration, EffectKind, StatusCondition,
    TickReport,
};
pub use dice::{
    parse_dice, DiceError, DiceFormula, DiceSource, RollOutcome, ScriptedDice, SeededDice,
    ThreadDice, MAX_DICE, MAX_MODIFIER, SUPPORTED_SIDES,
};
pub use error::{CombatError, Resource};
pub use narrative::{NarrativeRenderer, PlainNarrator};
pub use session::{
    movement_allowance, ActiveEffect, Area, CombatSession, CombatSummary, FinishedCombat,
    Participant, SessionId, SessionStatus, TerrainEffect, TurnReport,
};
pub use skills::Skill;

use crate::config::RulesConfig;

/// Stateless rules facade
pub struct Engine {
    rules: RulesConfig,
    conditions: ConditionRegistry,
    narrator: Box<dyn NarrativeRenderer>,
}

impl Engine {
    pub fn new(rules: RulesConfig) -> Self {
        Self {
            rules,
            conditions: ConditionRegistry::standard(),
            narrator: Box::new(PlainNarrator),
        }
    }

    /// Replace the narrative renderer
    pub fn with_narrator(mut self, narrator: impl NarrativeRenderer + 'static) -> Self {
        self.narrator = Box::new(narrator);
        self
    }

    /// Replace the condition table
    pub fn with_conditions(mut self, conditions: ConditionRegistry) -> Self {
        self.conditions = conditions;
        self
    }

    pub fn rules(&self) -> &RulesConfig {
        &self.rules
    }

    pub fn conditions(&self) -> &ConditionRegistry {
        &self.conditions
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(RulesConfig::default())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("rules", &self.rules)
            .field("conditions", &self.conditions)
            .finish_non_exhaustive()
    }
}
