//! Status conditions
//!
//! Named conditions carried by combat participants:
//! - Duration as a finite tick countdown or "until removed"
//! - A per-tick effect (e.g. poison damage)
//! - An optional save, rolled once per end of turn, that ends the condition

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, info};

use crate::character::{Character, StatKey, World};

use super::check::{CheckKind, RuleCheck};
use super::dice::DiceSource;
use super::Engine;

/// Condition names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionKind {
    Blinded,
    Charmed,
    Frightened,
    Paralyzed,
    Poisoned,
    Stunned,
    Blessed,
    Dodging,
    Helped,
    Hidden,
    Disengaging,
}

impl FromStr for ConditionKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "blinded" | "blind" => Ok(ConditionKind::Blinded),
            "charmed" | "charm" => Ok(ConditionKind::Charmed),
            "frightened" | "fear" => Ok(ConditionKind::Frightened),
            "paralyzed" | "paralyze" => Ok(ConditionKind::Paralyzed),
            "poisoned" | "poison" => Ok(ConditionKind::Poisoned),
            "stunned" | "stun" => Ok(ConditionKind::Stunned),
            "blessed" | "bless" => Ok(ConditionKind::Blessed),
            "dodging" | "dodge" => Ok(ConditionKind::Dodging),
            "helped" => Ok(ConditionKind::Helped),
            "hidden" => Ok(ConditionKind::Hidden),
            "disengaging" | "disengage" => Ok(ConditionKind::Disengaging),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConditionKind::Blinded => "blinded",
            ConditionKind::Charmed => "charmed",
            ConditionKind::Frightened => "frightened",
            ConditionKind::Paralyzed => "paralyzed",
            ConditionKind::Poisoned => "poisoned",
            ConditionKind::Stunned => "stunned",
            ConditionKind::Blessed => "blessed",
            ConditionKind::Dodging => "dodging",
            ConditionKind::Helped => "helped",
            ConditionKind::Hidden => "hidden",
            ConditionKind::Disengaging => "disengaging",
        };
        write!(f, "{}", s)
    }
}

impl ConditionKind {
    /// Whether this condition prevents taking actions
    pub fn prevents_action(&self) -> bool {
        matches!(self, ConditionKind::Stunned | ConditionKind::Paralyzed)
    }
}

/// How long a condition lasts
///
/// Serialized as an integer tick count, with `-1` meaning "until removed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Duration {
    Ticks(u32),
    UntilRemoved,
}

impl From<i64> for Duration {
    fn from(n: i64) -> Self {
        if n < 0 {
            Duration::UntilRemoved
        } else {
            Duration::Ticks(n.min(u32::MAX as i64) as u32)
        }
    }
}

impl From<Duration> for i64 {
    fn from(d: Duration) -> Self {
        match d {
            Duration::Ticks(n) => n as i64,
            Duration::UntilRemoved => -1,
        }
    }
}

impl Duration {
    /// The longer of two durations
    pub fn longest(self, other: Duration) -> Duration {
        match (self, other) {
            (Duration::Ticks(a), Duration::Ticks(b)) => Duration::Ticks(a.max(b)),
            _ => Duration::UntilRemoved,
        }
    }
}

/// What a condition or session effect does each tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectKind {
    #[default]
    None,
    PeriodicDamage {
        amount: i32,
    },
    PeriodicHeal {
        amount: i32,
    },
}

impl EffectKind {
    /// Apply one tick to a character, returning (damage, healing)
    pub fn apply(&self, character: &mut Character) -> (i32, i32) {
        match *self {
            EffectKind::None => (0, 0),
            EffectKind::PeriodicDamage { amount } => (character.take_damage(amount), 0),
            EffectKind::PeriodicHeal { amount } => (0, character.heal(amount)),
        }
    }
}

/// A condition instance on a participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCondition {
    pub name: ConditionKind,
    pub duration: Duration,
    #[serde(default)]
    pub effect: EffectKind,
    #[serde(default)]
    pub save_check: Option<RuleCheck>,
    /// Participant that imposed the condition
    #[serde(default)]
    pub source: Option<String>,
    /// Skip the next end-of-turn tick
    #[serde(default)]
    pub grace: bool,
}

impl StatusCondition {
    pub fn new(name: ConditionKind, duration: Duration) -> Self {
        Self {
            name,
            duration,
            effect: EffectKind::None,
            save_check: None,
            source: None,
            grace: false,
        }
    }

    pub fn with_effect(mut self, effect: EffectKind) -> Self {
        self.effect = effect;
        self
    }

    /// End the condition on a successful save of `stat` against `dc`
    pub fn with_save(mut self, stat: StatKey, dc: i32) -> Self {
        self.save_check = Some(RuleCheck::new(CheckKind::Save, stat, dc));
        self
    }

    pub fn with_source(mut self, source_id: &str) -> Self {
        self.source = Some(source_id.to_string());
        self
    }

    /// Mark as granted during the bearer's own turn
    pub fn with_grace(mut self) -> Self {
        self.grace = true;
        self
    }

    pub fn is_expired(&self) -> bool {
        self.duration == Duration::Ticks(0)
    }
}

/// Conditions on a single participant, unique by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionSet {
    conditions: Vec<StatusCondition>,
}

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a condition; an existing one of the same name is refreshed
    ///
    /// Returns true if the condition was newly added.
    pub fn apply(&mut self, condition: StatusCondition) -> bool {
        if let Some(existing) = self.conditions.iter_mut().find(|c| c.name == condition.name) {
            existing.duration = existing.duration.longest(condition.duration);
            existing.effect = condition.effect;
            existing.save_check = condition.save_check;
            existing.source = condition.source;
            existing.grace |= condition.grace;
            false
        } else {
            self.conditions.push(condition);
            true
        }
    }

    /// Remove a condition by name
    pub fn remove(&mut self, name: ConditionKind) -> bool {
        let before = self.conditions.len();
        self.conditions.retain(|c| c.name != name);
        self.conditions.len() != before
    }

    pub fn has(&self, name: ConditionKind) -> bool {
        self.get(name).is_some()
    }

    pub fn get(&self, name: ConditionKind) -> Option<&StatusCondition> {
        self.conditions.iter().find(|c| c.name == name && !c.is_expired())
    }

    /// Check if the bearer can act (not stunned/paralyzed)
    pub fn can_act(&self) -> bool {
        !self
            .conditions
            .iter()
            .any(|c| c.name.prevents_action() && !c.is_expired())
    }

    /// Whether the bearer is charmed by `source_id`
    pub fn charmed_by(&self, source_id: &str) -> bool {
        self.get(ConditionKind::Charmed)
            .is_some_and(|c| c.source.as_deref() == Some(source_id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatusCondition> {
        self.conditions.iter()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn clear(&mut self) {
        self.conditions.clear();
    }
}

/// Templates for named conditions
#[derive(Debug, Clone)]
pub struct ConditionRegistry {
    templates: HashMap<ConditionKind, StatusCondition>,
}

impl Default for ConditionRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl ConditionRegistry {
    /// The standard condition table
    pub fn standard() -> Self {
        use ConditionKind::*;

        let templates = [
            StatusCondition::new(Blinded, Duration::UntilRemoved),
            StatusCondition::new(Charmed, Duration::UntilRemoved).with_save(StatKey::Wisdom, 15),
            StatusCondition::new(Frightened, Duration::UntilRemoved)
                .with_save(StatKey::Wisdom, 13),
            StatusCondition::new(Paralyzed, Duration::UntilRemoved)
                .with_save(StatKey::Constitution, 15),
            StatusCondition::new(Poisoned, Duration::Ticks(10))
                .with_effect(EffectKind::PeriodicDamage { amount: 2 })
                .with_save(StatKey::Constitution, 12),
            StatusCondition::new(Stunned, Duration::Ticks(1)),
            StatusCondition::new(Blessed, Duration::Ticks(10)),
            StatusCondition::new(Dodging, Duration::Ticks(1)),
            StatusCondition::new(Helped, Duration::Ticks(1)),
            StatusCondition::new(Hidden, Duration::UntilRemoved),
            StatusCondition::new(Disengaging, Duration::Ticks(1)),
        ]
        .into_iter()
        .map(|c| (c.name, c))
        .collect();

        Self { templates }
    }

    /// Replace or add a template
    pub fn register(&mut self, template: StatusCondition) {
        self.templates.insert(template.name, template);
    }

    /// A fresh instance of the named condition
    pub fn get(&self, name: ConditionKind) -> Option<StatusCondition> {
        self.templates.get(&name).cloned()
    }

    /// A fresh instance, or a bare one-tick condition if unregistered
    pub fn instantiate(&self, name: ConditionKind) -> StatusCondition {
        self.get(name)
            .unwrap_or_else(|| StatusCondition::new(name, Duration::Ticks(1)))
    }
}

/// What happened to a participant's conditions at end of turn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub damage: i32,
    pub healed: i32,
    /// Conditions ended by a successful save
    pub saved: Vec<ConditionKind>,
    /// Conditions whose duration ran out
    pub expired: Vec<ConditionKind>,
}

impl Engine {
    /// Process one end-of-turn tick for a bearer's conditions
    ///
    /// Each condition applies its effect, then rolls its save (a success removes
    /// it regardless of duration), then counts down one tick.
    pub fn tick_conditions(
        &self,
        bearer: &mut Character,
        conditions: &mut ConditionSet,
        world: Option<&World>,
        dice: &mut dyn DiceSource,
    ) -> TickReport {
        let mut report = TickReport::default();
        let mut kept = Vec::with_capacity(conditions.len());
        let snapshot = conditions.clone();

        for mut condition in std::mem::take(&mut conditions.conditions) {
            if condition.grace {
                condition.grace = false;
                kept.push(condition);
                continue;
            }

            if bearer.is_alive() {
                let (damage, healed) = condition.effect.apply(bearer);
                report.damage += damage;
                report.healed += healed;
                if damage > 0 {
                    debug!("{} takes {} damage from {}", bearer.name, damage, condition.name);
                }
            }

            if let Some(save) = &condition.save_check {
                let result = self.perform_check(bearer, &snapshot, save, world, dice);
                if result.success {
                    info!("{} saves against {}", bearer.name, condition.name);
                    report.saved.push(condition.name);
                    continue;
                }
            }

            if let Duration::Ticks(n) = condition.duration {
                let left = n.saturating_sub(1);
                if left == 0 {
                    debug!("{} wears off {}", condition.name, bearer.name);
                    report.expired.push(condition.name);
                    continue;
                }
                condition.duration = Duration::Ticks(left);
            }

            kept.push(condition);
        }

        conditions.conditions = kept;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::Stats;
    use crate::combat::{Engine, ScriptedDice};

    #[test]
    fn test_registered_template_replaces_standard() {
        let mut registry = ConditionRegistry::standard();
        registry.register(
            StatusCondition::new(ConditionKind::Poisoned, Duration::Ticks(3))
                .with_effect(EffectKind::PeriodicDamage { amount: 5 }),
        );
        let engine = Engine::default().with_conditions(registry);

        let poison = engine.conditions().instantiate(ConditionKind::Poisoned);
        assert_eq!(poison.duration, Duration::Ticks(3));
        assert_eq!(poison.effect, EffectKind::PeriodicDamage { amount: 5 });
        assert!(poison.save_check.is_none());

        let mut hero = Character::new("h", "Hero");
        let mut set = ConditionSet::new();
        set.apply(poison);
        let mut dice = ScriptedDice::repeat(10);
        let report = engine.tick_conditions(&mut hero, &mut set, None, &mut dice);
        assert_eq!(report.damage, 5);
    }

    fn bearer() -> Character {
        Character::new("b", "Bearer").with_stats(Stats {
            health: 30,
            max_health: 30,
            ..Stats::default()
        })
    }

    #[test]
    fn test_condition_parsing() {
        assert_eq!("poisoned".parse::<ConditionKind>(), Ok(ConditionKind::Poisoned));
        assert_eq!("STUN".parse::<ConditionKind>(), Ok(ConditionKind::Stunned));
        assert!("invalid".parse::<ConditionKind>().is_err());
    }

    #[test]
    fn test_duration_serde_sentinel() {
        assert_eq!(serde_json::to_string(&Duration::UntilRemoved).unwrap(), "-1");
        assert_eq!(serde_json::to_string(&Duration::Ticks(3)).unwrap(), "3");
        let d: Duration = serde_json::from_str("-1").unwrap();
        assert_eq!(d, Duration::UntilRemoved);
    }

    #[test]
    fn test_reapply_refreshes() {
        let mut set = ConditionSet::new();
        assert!(set.apply(StatusCondition::new(ConditionKind::Stunned, Duration::Ticks(2))));
        assert!(!set.apply(StatusCondition::new(ConditionKind::Stunned, Duration::Ticks(5))));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(ConditionKind::Stunned).unwrap().duration, Duration::Ticks(5));

        // Shorter reapply does not shorten
        set.apply(StatusCondition::new(ConditionKind::Stunned, Duration::Ticks(1)));
        assert_eq!(set.get(ConditionKind::Stunned).unwrap().duration, Duration::Ticks(5));
    }

    #[test]
    fn test_prevents_action() {
        let mut set = ConditionSet::new();
        assert!(set.can_act());
        set.apply(StatusCondition::new(ConditionKind::Paralyzed, Duration::UntilRemoved));
        assert!(!set.can_act());
        set.remove(ConditionKind::Paralyzed);
        assert!(set.can_act());
    }

    #[test]
    fn test_expires_after_exact_ticks() {
        let engine = Engine::default();
        let mut hero = bearer();
        let mut set = ConditionSet::new();
        set.apply(StatusCondition::new(ConditionKind::Blessed, Duration::Ticks(2)));

        let mut dice = ScriptedDice::repeat(10);
        engine.tick_conditions(&mut hero, &mut set, None, &mut dice);
        assert!(set.has(ConditionKind::Blessed));

        let report = engine.tick_conditions(&mut hero, &mut set, None, &mut dice);
        assert!(!set.has(ConditionKind::Blessed));
        assert_eq!(report.expired, vec![ConditionKind::Blessed]);
    }

    #[test]
    fn test_until_removed_persists() {
        let engine = Engine::default();
        let mut hero = bearer();
        let mut set = ConditionSet::new();
        set.apply(StatusCondition::new(ConditionKind::Blinded, Duration::UntilRemoved));

        let mut dice = ScriptedDice::repeat(20);
        for _ in 0..20 {
            engine.tick_conditions(&mut hero, &mut set, None, &mut dice);
        }
        assert!(set.has(ConditionKind::Blinded));
    }

    #[test]
    fn test_successful_save_removes_immediately() {
        let engine = Engine::default();
        let mut hero = bearer();
        let mut set = ConditionSet::new();
        set.apply(engine.conditions().instantiate(ConditionKind::Paralyzed));

        // DC 15 constitution save, natural 18
        let mut dice = ScriptedDice::repeat(18);
        let report = engine.tick_conditions(&mut hero, &mut set, None, &mut dice);
        assert_eq!(report.saved, vec![ConditionKind::Paralyzed]);
        assert!(set.is_empty());
    }

    #[test]
    fn test_grace_skips_one_tick() {
        let engine = Engine::default();
        let mut hero = bearer();
        let mut set = ConditionSet::new();
        set.apply(StatusCondition::new(ConditionKind::Dodging, Duration::Ticks(1)).with_grace());

        let mut dice = ScriptedDice::repeat(10);
        engine.tick_conditions(&mut hero, &mut set, None, &mut dice);
        assert!(set.has(ConditionKind::Dodging));
        engine.tick_conditions(&mut hero, &mut set, None, &mut dice);
        assert!(!set.has(ConditionKind::Dodging));
    }

    #[test]
    fn test_periodic_heal() {
        let engine = Engine::default();
        let mut hero = bearer();
        hero.stats.health = 20;
        let mut set = ConditionSet::new();
        set.apply(
            StatusCondition::new(ConditionKind::Blessed, Duration::Ticks(3))
                .with_effect(EffectKind::PeriodicHeal { amount: 4 }),
        );

        let mut dice = ScriptedDice::repeat(10);
        let report = engine.tick_conditions(&mut hero, &mut set, None, &mut dice);
        assert_eq!(report.healed, 4);
        assert_eq!(hero.stats.health, 24);
    }

    #[test]
    fn test_charmed_by_source() {
        let mut set = ConditionSet::new();
        let charm = StatusCondition::new(ConditionKind::Charmed, Duration::UntilRemoved);
        set.apply(charm.with_source("witch"));
        assert!(set.charmed_by("witch"));
        assert!(!set.charmed_by("goblin"));
    }
}
