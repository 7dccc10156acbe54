//! Checks and modifiers
//!
//! A check is resolved in a fixed order, independent of how modifiers were
//! collected:
//! 1. advantage/disadvantage decide how the d20 is rolled
//! 2. all multipliers combine into one factor applied to the rolled value
//! 3. flat modifiers are summed and added
//! 4. the bounded outcome bias is added last

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::character::{ClassArchetype, Character, Faction, Genre, StatKey, World};

use super::adjust::outcome_bias;
use super::conditions::{ConditionKind, ConditionSet};
use super::dice::{DiceFormula, DiceSource};
use super::Engine;

/// Kinds of check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    Skill,
    Ability,
    Save,
    Attack,
    Damage,
    Initiative,
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CheckKind::Skill => "skill",
            CheckKind::Ability => "ability",
            CheckKind::Save => "save",
            CheckKind::Attack => "attack",
            CheckKind::Damage => "damage",
            CheckKind::Initiative => "initiative",
        };
        write!(f, "{}", s)
    }
}

/// How a modifier applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModifierKind {
    Flat,
    Multiplier,
    Advantage,
    Disadvantage,
}

/// Predicate gating a modifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "when", rename_all = "snake_case")]
pub enum ModifierCondition {
    StatAtLeast { stat: StatKey, value: i32 },
    StatBelow { stat: StatKey, value: i32 },
    /// Health under this fraction of max health
    HealthBelow { fraction: f64 },
    Archetype { archetype: ClassArchetype },
    Race { race: String },
    Faction { faction: Faction },
    HasCondition { condition: ConditionKind },
    Genre { genre: Genre },
}

impl ModifierCondition {
    pub fn holds(
        &self,
        character: &Character,
        conditions: &ConditionSet,
        world: Option<&World>,
    ) -> bool {
        match self {
            ModifierCondition::StatAtLeast { stat, value } => character.stats.get(*stat) >= *value,
            ModifierCondition::StatBelow { stat, value } => character.stats.get(*stat) < *value,
            ModifierCondition::HealthBelow { fraction } => character.is_desperate(*fraction),
            ModifierCondition::Archetype { archetype } => character.archetype == *archetype,
            ModifierCondition::Race { race } => character.race.eq_ignore_ascii_case(race),
            ModifierCondition::Faction { faction } => character.faction() == *faction,
            ModifierCondition::HasCondition { condition } => conditions.has(*condition),
            ModifierCondition::Genre { genre } => world.is_some_and(|w| w.genre == *genre),
        }
    }
}

/// A bonus or penalty on a check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleModifier {
    pub source: String,
    #[serde(default)]
    pub value: f64,
    #[serde(rename = "type")]
    pub kind: ModifierKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ModifierCondition>,
}

impl RuleModifier {
    pub fn flat(source: &str, value: i32) -> Self {
        Self {
            source: source.to_string(),
            value: value as f64,
            kind: ModifierKind::Flat,
            condition: None,
        }
    }

    pub fn multiplier(source: &str, factor: f64) -> Self {
        Self {
            source: source.to_string(),
            value: factor,
            kind: ModifierKind::Multiplier,
            condition: None,
        }
    }

    pub fn advantage(source: &str) -> Self {
        Self {
            source: source.to_string(),
            value: 0.0,
            kind: ModifierKind::Advantage,
            condition: None,
        }
    }

    pub fn disadvantage(source: &str) -> Self {
        Self {
            source: source.to_string(),
            value: 0.0,
            kind: ModifierKind::Disadvantage,
            condition: None,
        }
    }

    pub fn when(mut self, condition: ModifierCondition) -> Self {
        self.condition = Some(condition);
        self
    }
}

/// A check against a difficulty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCheck {
    #[serde(rename = "type")]
    pub kind: CheckKind,
    pub difficulty: i32,
    pub stat: StatKey,
    #[serde(default)]
    pub modifiers: Vec<RuleModifier>,
    /// Caller data passed through to renderers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl RuleCheck {
    pub fn new(kind: CheckKind, stat: StatKey, difficulty: i32) -> Self {
        Self {
            kind,
            difficulty,
            stat,
            modifiers: Vec::new(),
            context: None,
        }
    }

    pub fn with_modifier(mut self, modifier: RuleModifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    pub fn with_modifiers(mut self, modifiers: impl IntoIterator<Item = RuleModifier>) -> Self {
        self.modifiers.extend(modifiers);
        self
    }
}

/// Modifiers reduced to their canonical form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedModifiers {
    pub advantage: bool,
    pub disadvantage: bool,
    /// Product of all multipliers
    pub factor: f64,
    /// Sum of all flat modifiers, floored
    pub flat: i32,
}

impl Default for AggregatedModifiers {
    fn default() -> Self {
        Self {
            advantage: false,
            disadvantage: false,
            factor: 1.0,
            flat: 0,
        }
    }
}

impl AggregatedModifiers {
    /// Reduce a modifier list; the result does not depend on list order
    pub fn from_modifiers(modifiers: &[RuleModifier]) -> Self {
        let mut agg = Self::default();
        let mut flat = 0.0;
        for m in modifiers {
            match m.kind {
                ModifierKind::Flat => flat += m.value,
                ModifierKind::Multiplier => agg.factor *= m.value,
                ModifierKind::Advantage => agg.advantage = true,
                ModifierKind::Disadvantage => agg.disadvantage = true,
            }
        }
        agg.flat = flat.floor() as i32;
        agg
    }

    /// Apply factor, then flat sum, then bias
    pub fn apply(&self, rolled: i32, bias: i32) -> i32 {
        (rolled as f64 * self.factor).floor() as i32 + self.flat + bias
    }
}

/// Result of a resolved check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub success: bool,
    /// d20 plus ability modifier, after advantage resolution
    pub roll: i32,
    /// Raw face of the kept d20
    pub natural: u32,
    pub total: i32,
    pub critical: bool,
    pub fumble: bool,
    pub advantage: bool,
    pub disadvantage: bool,
    pub bias: i32,
    /// Every modifier that applied
    pub modifiers: Vec<RuleModifier>,
    pub narrative: String,
}

impl Engine {
    /// Collect every modifier that applies to a check
    ///
    /// Explicit check modifiers come first, then class, race, world and
    /// condition-derived ones. Modifiers whose predicate fails are dropped.
    pub fn gather_modifiers(
        &self,
        character: &Character,
        conditions: &ConditionSet,
        check: &RuleCheck,
        world: Option<&World>,
    ) -> Vec<RuleModifier> {
        let mut modifiers: Vec<RuleModifier> = check.modifiers.clone();

        // Class bonuses
        if character.archetype == ClassArchetype::Rogue && check.kind == CheckKind::Skill {
            modifiers.push(RuleModifier::flat("expertise", 2));
        }

        // Race bonuses
        if character.race.eq_ignore_ascii_case("elf") && check.stat == StatKey::Agility {
            modifiers.push(RuleModifier::flat("elven grace", 1));
        }

        // Environment
        if world.is_some_and(|w| w.genre == Genre::Horror) && check.kind == CheckKind::Save {
            modifiers.push(RuleModifier::flat("horror atmosphere", -2));
        }

        // Conditions
        for condition in conditions.iter().filter(|c| !c.is_expired()) {
            let name = condition.name;
            match (name, check.kind) {
                (ConditionKind::Blessed, CheckKind::Attack) => {
                    modifiers.push(RuleModifier::advantage("blessing"));
                }
                (ConditionKind::Helped, CheckKind::Attack | CheckKind::Skill) => {
                    modifiers.push(RuleModifier::advantage("help"));
                }
                (ConditionKind::Hidden, CheckKind::Attack) => {
                    modifiers.push(RuleModifier::advantage("unseen attacker"));
                }
                (ConditionKind::Blinded, CheckKind::Attack) => {
                    modifiers.push(RuleModifier::disadvantage("blinded"));
                }
                (
                    ConditionKind::Poisoned | ConditionKind::Frightened,
                    CheckKind::Attack | CheckKind::Ability,
                ) => {
                    modifiers.push(RuleModifier::disadvantage(&name.to_string()));
                }
                _ => {}
            }
        }

        modifiers.retain(|m| {
            m.condition
                .as_ref()
                .is_none_or(|c| c.holds(character, conditions, world))
        });
        modifiers
    }

    /// Resolve a check for a character
    pub fn perform_check(
        &self,
        character: &Character,
        conditions: &ConditionSet,
        check: &RuleCheck,
        world: Option<&World>,
        dice: &mut dyn DiceSource,
    ) -> CheckResult {
        debug!(
            "{} attempts {} check (DC {})",
            character.name, check.kind, check.difficulty
        );

        let ability_mod = character.ability_mod(check.stat);
        let modifiers = self.gather_modifiers(character, conditions, check, world);
        let agg = AggregatedModifiers::from_modifiers(&modifiers);
        let bias = outcome_bias(character, check, world, &self.rules);

        let outcome = DiceFormula::d20(ability_mod)
            .with_advantage(agg.advantage)
            .with_disadvantage(agg.disadvantage)
            .roll_detailed(dice);

        let total = agg.apply(outcome.total, bias);
        let success = total >= check.difficulty;
        let critical = outcome.critical;
        let fumble = outcome.fumble;
        let narrative = self
            .narrator
            .check(character, check.kind, success, critical, fumble);

        CheckResult {
            success,
            roll: outcome.total,
            natural: outcome.natural.unwrap_or_default(),
            total,
            critical,
            fumble,
            advantage: agg.advantage,
            disadvantage: agg.disadvantage,
            bias,
            modifiers,
            narrative,
        }
    }
}
