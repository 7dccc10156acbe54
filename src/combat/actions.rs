//! Action processing
//!
//! Every precondition is checked before anything is mutated, so a rejected
//! action leaves the session exactly as it was.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::character::{Position, StatKey};
use crate::config::RulesConfig;

use super::check::{CheckKind, CheckResult, RuleCheck, RuleModifier};
use super::conditions::ConditionKind;
use super::dice::{DiceFormula, DiceSource};
use super::error::{CombatError, Resource};
use super::session::{Area, CombatSession, CombatSummary, Participant};
use super::Engine;

/// How long a spell takes to cast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CastingTime {
    #[default]
    Action,
    BonusAction,
}

/// A spell as described by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spell {
    pub name: String,
    #[serde(default = "default_spell_level")]
    pub level: u32,
    /// Damage on a failed save
    #[serde(default)]
    pub damage: Option<DiceFormula>,
    /// Stat targets save with; wisdom when unset
    #[serde(default)]
    pub save: Option<StatKey>,
    /// Affects everyone inside when no single target is given
    #[serde(default)]
    pub area: Option<Area>,
    #[serde(default)]
    pub casting: CastingTime,
    /// Condition applied on a failed save
    #[serde(default)]
    pub inflicts: Option<ConditionKind>,
}

fn default_spell_level() -> u32 {
    1
}

impl Spell {
    pub fn new(name: &str, level: u32) -> Self {
        Self {
            name: name.to_string(),
            level,
            damage: None,
            save: None,
            area: None,
            casting: CastingTime::Action,
            inflicts: None,
        }
    }

    pub fn with_damage(mut self, damage: DiceFormula) -> Self {
        self.damage = Some(damage);
        self
    }

    pub fn with_save(mut self, stat: StatKey) -> Self {
        self.save = Some(stat);
        self
    }

    pub fn with_area(mut self, area: Area) -> Self {
        self.area = Some(area);
        self
    }

    pub fn inflicting(mut self, condition: ConditionKind) -> Self {
        self.inflicts = Some(condition);
        self
    }

    pub fn as_bonus_action(mut self) -> Self {
        self.casting = CastingTime::BonusAction;
        self
    }

    /// Mana needed to cast; `None` when the cost does not fit in an `i64`
    pub fn mana_cost(&self, rules: &RulesConfig) -> Option<i64> {
        i64::from(self.level)
            .checked_mul(i64::from(rules.mana_per_spell_level))
            .map(|cost| cost.max(0))
    }

    pub fn save_stat(&self) -> StatKey {
        self.save.unwrap_or(StatKey::Wisdom)
    }

    /// Damage rolled on a failed save; pure condition spells deal none
    fn damage_formula(&self, rules: &RulesConfig) -> Option<DiceFormula> {
        match (&self.damage, self.inflicts) {
            (Some(formula), _) => Some(formula.clone()),
            (None, None) => Some(rules.default_spell_damage.clone()),
            (None, Some(_)) => None,
        }
    }
}

/// An action submitted by the active participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Attack {
        target: String,
    },
    Spell {
        spell: Spell,
        #[serde(default)]
        target: Option<String>,
    },
    Move {
        to: Position,
    },
    Dodge,
    Disengage,
    Help {
        target: String,
    },
    Hide,
    EndTurn,
}

/// One resolved attack, including opportunity attacks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackReport {
    pub attacker: String,
    pub target: String,
    pub hit: bool,
    pub critical: bool,
    pub fumble: bool,
    /// Damage actually applied
    pub damage: i32,
    pub check: CheckResult,
}

/// Result of an accepted action
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    pub damage: Option<i32>,
    pub critical: bool,
    pub fumble: bool,
    /// Names of participants the action landed on
    pub targets: Vec<String>,
    /// Names of participants that saved against it
    pub resisted: Vec<String>,
    /// Conditions installed by the action
    pub effects: Vec<String>,
    pub check: Option<CheckResult>,
    pub opportunity_attacks: Vec<AttackReport>,
    pub narrative: String,
    pub turn_ended: bool,
    /// Set when this action ended the combat
    pub ended: Option<CombatSummary>,
}

fn living_target(session: &CombatSession, target_id: &str) -> Result<usize, CombatError> {
    session
        .index_of(target_id)
        .filter(|&i| session.participants[i].is_alive())
        .ok_or_else(|| CombatError::InvalidTarget(target_id.to_string()))
}

fn require_action(participant: &Participant) -> Result<(), CombatError> {
    if participant.actions == 0 {
        return Err(CombatError::insufficient(Resource::Actions, 1u32, 0u32));
    }
    Ok(())
}

fn spend_action(participant: &mut Participant) {
    assert!(participant.actions > 0, "action pool underflow for {}", participant.id());
    participant.actions -= 1;
}

/// Whether `ally` stands on the far side of `target` from `attacker`
fn opposite_sides(target: &Position, attacker: &Position, ally: &Position) -> bool {
    let a = (attacker.x - target.x, attacker.y - target.y, attacker.z - target.z);
    let b = (ally.x - target.x, ally.y - target.y, ally.z - target.z);
    a.0 * b.0 + a.1 * b.1 + a.2 * b.2 < 0.0
}

impl Engine {
    /// Resolve one action by the active participant
    ///
    /// After the action, the session is checked for termination; otherwise the
    /// turn ends automatically once the actor has no actions or bonus actions
    /// left, or has fallen.
    pub fn process_action(
        &self,
        session: &mut CombatSession,
        actor_id: &str,
        action: Action,
        dice: &mut dyn DiceSource,
    ) -> Result<ActionOutcome, CombatError> {
        if !session.is_active() {
            return Err(CombatError::SessionEnded);
        }
        let actor = session
            .index_of(actor_id)
            .ok_or_else(|| CombatError::InvalidTarget(actor_id.to_string()))?;
        if actor != session.current_turn {
            return Err(CombatError::NotYourTurn(
                session.participants[actor].character.name.clone(),
            ));
        }

        if action == Action::EndTurn {
            let report = self.end_turn(session, dice)?;
            let mut outcome = ActionOutcome {
                success: true,
                turn_ended: true,
                ended: report.ended_combat,
                ..Default::default()
            };
            outcome.narrative =
                self.narrator
                    .action(&session.participants[actor].character, &action, &outcome);
            return Ok(outcome);
        }

        if !session.participants[actor].conditions.can_act() {
            return Err(CombatError::Incapacitated(
                session.participants[actor].character.name.clone(),
            ));
        }

        debug!("{} takes action {:?}", actor_id, action);

        let mut outcome = match &action {
            Action::Attack { target } => self.attack(session, actor, target, dice)?,
            Action::Spell { spell, target } => {
                self.cast_spell(session, actor, spell, target.as_deref(), dice)?
            }
            Action::Move { to } => self.move_to(session, actor, *to, dice)?,
            Action::Dodge => self.take_stance(session, actor, ConditionKind::Dodging)?,
            Action::Disengage => self.take_stance(session, actor, ConditionKind::Disengaging)?,
            Action::Help { target } => self.help(session, actor, target)?,
            Action::Hide => self.hide(session, actor, dice)?,
            Action::EndTurn => ActionOutcome::default(),
        };

        if let Some(summary) = self.evaluate_termination(session) {
            outcome.ended = Some(summary);
        } else {
            let participant = &session.participants[actor];
            if !participant.is_alive() || participant.turn_exhausted() {
                let report = self.end_turn(session, dice)?;
                outcome.turn_ended = true;
                outcome.ended = report.ended_combat;
            }
        }

        outcome.narrative =
            self.narrator
                .action(&session.participants[actor].character, &action, &outcome);
        Ok(outcome)
    }

    fn attack(
        &self,
        session: &mut CombatSession,
        actor: usize,
        target_id: &str,
        dice: &mut dyn DiceSource,
    ) -> Result<ActionOutcome, CombatError> {
        let target = living_target(session, target_id)?;
        if target == actor {
            return Err(CombatError::InvalidTarget(target_id.to_string()));
        }
        let attacker = &session.participants[actor];
        // A charmed creature cannot attack its charmer
        if attacker.conditions.charmed_by(target_id) {
            return Err(CombatError::InvalidTarget(target_id.to_string()));
        }
        require_action(attacker)?;

        spend_action(&mut session.participants[actor]);
        let report = self.resolve_attack(session, actor, target, dice);

        Ok(ActionOutcome {
            success: report.hit,
            damage: report.hit.then_some(report.damage),
            critical: report.critical,
            fumble: report.fumble,
            targets: vec![session.participants[target].character.name.clone()],
            check: Some(report.check),
            ..Default::default()
        })
    }

    /// Roll an attack and apply its damage
    fn resolve_attack(
        &self,
        session: &mut CombatSession,
        attacker: usize,
        target: usize,
        dice: &mut dyn DiceSource,
    ) -> AttackReport {
        let check = self.attack_check(session, attacker, target);

        let a = &session.participants[attacker];
        let world = session.world.as_ref();
        let result = self.perform_check(&a.character, &a.conditions, &check, world, dice);
        let formula = a
            .character
            .equipment
            .weapon
            .as_ref()
            .map_or_else(|| self.rules.unarmed_damage.clone(), |w| w.damage.clone());
        let strength_mod = a.character.ability_mod(StatKey::Strength);
        let attacker_id = a.id().to_string();

        // Natural 20 always hits, natural 1 always misses
        let hit = result.critical || (result.success && !result.fumble);
        let mut damage = 0;
        if hit {
            let mut rolled = formula.roll(dice) + strength_mod;
            if result.critical {
                rolled += DiceFormula::new(formula.dice, formula.sides, 0).roll(dice);
            }
            damage = session.participants[target].character.take_damage(rolled);
        }

        let a = &mut session.participants[attacker];
        a.conditions.remove(ConditionKind::Hidden);
        a.conditions.remove(ConditionKind::Helped);

        let t = &session.participants[target];
        if hit {
            info!(
                "{} hits {} for {} damage ({} left)",
                attacker_id,
                t.id(),
                damage,
                t.character.stats.health
            );
        } else {
            debug!("{} misses {}", attacker_id, t.id());
        }

        AttackReport {
            attacker: attacker_id,
            target: t.id().to_string(),
            hit,
            critical: result.critical,
            fumble: result.fumble,
            damage,
            check: result,
        }
    }

    /// Build the attack check against the target's armor class
    fn attack_check(&self, session: &CombatSession, attacker: usize, target: usize) -> RuleCheck {
        let a = &session.participants[attacker];
        let t = &session.participants[target];
        let weapon = a.character.equipment.weapon.as_ref();

        let stat = if weapon.is_some_and(|w| w.finesse) {
            StatKey::Agility
        } else {
            StatKey::Strength
        };
        let mut check = RuleCheck::new(CheckKind::Attack, stat, t.character.armor_class());

        if self.is_flanking(session, attacker, target) {
            check = check.with_modifier(RuleModifier::advantage("flanking"));
        }
        if a.character.position.z > t.character.position.z {
            let bonus = self.rules.high_ground_bonus;
            check = check.with_modifier(RuleModifier::flat("high ground", bonus));
        }
        if let Some(weapon) = weapon.filter(|w| w.enchantment != 0) {
            check = check.with_modifier(RuleModifier::flat("enchantment", weapon.enchantment));
        }
        if t.conditions.has(ConditionKind::Dodging) {
            check = check.with_modifier(RuleModifier::disadvantage("target dodging"));
        }

        check.with_modifiers(self.terrain_modifiers(session, attacker))
    }

    /// An able ally adjacent to the target on the side opposite the attacker
    fn is_flanking(&self, session: &CombatSession, attacker: usize, target: usize) -> bool {
        let reach = self.rules.melee_reach_ft;
        let fpu = self.rules.feet_per_unit;
        let a = &session.participants[attacker];
        let target_pos = &session.participants[target].character.position;

        if !a.character.position.within_reach(target_pos, reach, fpu) {
            return false;
        }

        session
            .participants
            .iter()
            .enumerate()
            .filter(|(i, p)| {
                *i != attacker
                    && *i != target
                    && p.is_alive()
                    && p.faction() == a.faction()
                    && p.conditions.can_act()
            })
            .any(|(_, ally)| {
                ally.character.position.within_reach(target_pos, reach, fpu)
                    && opposite_sides(target_pos, &a.character.position, &ally.character.position)
            })
    }

    /// Modifiers from terrain the participant stands in
    fn terrain_modifiers(&self, session: &CombatSession, participant: usize) -> Vec<RuleModifier> {
        let position = &session.participants[participant].character.position;
        session
            .terrain_at(position, self.rules.feet_per_unit)
            .flat_map(|t| t.modifiers.iter().cloned())
            .collect()
    }

    fn cast_spell(
        &self,
        session: &mut CombatSession,
        caster: usize,
        spell: &Spell,
        target_id: Option<&str>,
        dice: &mut dyn DiceSource,
    ) -> Result<ActionOutcome, CombatError> {
        let fpu = self.rules.feet_per_unit;
        let targets: Vec<usize> = match (target_id, &spell.area) {
            (Some(id), _) => vec![living_target(session, id)?],
            (None, Some(area)) => session
                .participants
                .iter()
                .enumerate()
                .filter(|(i, p)| {
                    *i != caster && p.is_alive() && area.contains(&p.character.position, fpu)
                })
                .map(|(i, _)| i)
                .collect(),
            (None, None) => Vec::new(),
        };

        let p = &session.participants[caster];
        match spell.casting {
            CastingTime::Action => require_action(p)?,
            CastingTime::BonusAction if p.bonus_actions == 0 => {
                return Err(CombatError::insufficient(Resource::BonusActions, 1u32, 0u32));
            }
            CastingTime::BonusAction => {}
        }
        let mana = p.character.stats.mana;
        let cost = spell.mana_cost(&self.rules).unwrap_or(i64::MAX);
        if cost > i64::from(mana) {
            return Err(CombatError::insufficient(Resource::Mana, cost, mana));
        }
        // Bounded by the caster's mana, so it fits
        let cost = cost as i32;

        let dc = 8 + p.character.ability_mod(StatKey::Intelligence) + self.rules.proficiency_bonus;
        let caster_id = p.id().to_string();

        let p = &mut session.participants[caster];
        p.character.stats.mana -= cost;
        match spell.casting {
            CastingTime::Action => spend_action(p),
            CastingTime::BonusAction => p.bonus_actions -= 1,
        }
        debug!("{} casts {} (DC {}, {} mana)", caster_id, spell.name, dc, cost);

        let formula = spell.damage_formula(&self.rules);
        let mut outcome = ActionOutcome {
            success: true,
            ..Default::default()
        };
        let mut dealt = None;

        for target in targets {
            let save = RuleCheck::new(CheckKind::Save, spell.save_stat(), dc)
                .with_modifiers(self.terrain_modifiers(session, target));
            let t = &session.participants[target];
            let world = session.world.as_ref();
            let result = self.perform_check(&t.character, &t.conditions, &save, world, dice);
            let name = t.character.name.clone();

            if result.success {
                info!("{} resists {}", name, spell.name);
                outcome.resisted.push(name);
                continue;
            }

            let t = &mut session.participants[target];
            if let Some(formula) = &formula {
                let applied = t.character.take_damage(formula.roll(dice));
                dealt = Some(dealt.unwrap_or(0) + applied);
            }
            if let Some(kind) = spell.inflicts {
                t.conditions
                    .apply(self.conditions.instantiate(kind).with_source(&caster_id));
                outcome.effects.push(format!("{} is {}", name, kind));
            }
            outcome.targets.push(name);
        }

        outcome.damage = dealt;
        Ok(outcome)
    }

    fn move_to(
        &self,
        session: &mut CombatSession,
        mover: usize,
        to: Position,
        dice: &mut dyn DiceSource,
    ) -> Result<ActionOutcome, CombatError> {
        let fpu = self.rules.feet_per_unit;
        let reach = self.rules.melee_reach_ft;

        let p = &session.participants[mover];
        let from = p.character.position;
        let mut cost = from.distance_ft(&to, fpu).ceil() as u32;
        if session.terrain_at(&to, fpu).any(|t| t.difficult) {
            cost *= 2;
        }
        if cost > p.movement {
            return Err(CombatError::insufficient(Resource::Movement, cost, p.movement));
        }

        let mut outcome = ActionOutcome::default();

        if !p.conditions.has(ConditionKind::Disengaging) {
            let mover_id = p.id().to_string();
            let faction = p.faction();
            let threats: Vec<usize> = session
                .participants
                .iter()
                .enumerate()
                .filter(|(i, e)| {
                    *i != mover
                        && e.is_alive()
                        && e.faction() != faction
                        && e.reactions > 0
                        && e.conditions.can_act()
                        && !e.conditions.charmed_by(&mover_id)
                        && e.character.position.within_reach(&from, reach, fpu)
                        && !e.character.position.within_reach(&to, reach, fpu)
                })
                .map(|(i, _)| i)
                .collect();

            for enemy in threats {
                if !session.participants[mover].is_alive() {
                    break;
                }
                info!(
                    "Opportunity attack from {} on {}",
                    session.participants[enemy].id(),
                    mover_id
                );
                session.participants[enemy].reactions -= 1;
                let report = self.resolve_attack(session, enemy, mover, dice);
                outcome.opportunity_attacks.push(report);
            }
        }

        let p = &mut session.participants[mover];
        if !p.is_alive() {
            return Ok(outcome);
        }
        p.character.position = to;
        p.movement -= cost;
        outcome.success = true;
        Ok(outcome)
    }

    /// Dodge and disengage: a one-turn condition on the actor
    fn take_stance(
        &self,
        session: &mut CombatSession,
        actor: usize,
        kind: ConditionKind,
    ) -> Result<ActionOutcome, CombatError> {
        let p = &mut session.participants[actor];
        require_action(p)?;
        spend_action(p);
        p.conditions
            .apply(self.conditions.instantiate(kind).with_grace());

        Ok(ActionOutcome {
            success: true,
            effects: vec![kind.to_string()],
            ..Default::default()
        })
    }

    fn help(
        &self,
        session: &mut CombatSession,
        helper: usize,
        target_id: &str,
    ) -> Result<ActionOutcome, CombatError> {
        let target = living_target(session, target_id)?;
        // Only allies can be helped
        if target == helper
            || session.participants[target].faction() != session.participants[helper].faction()
        {
            return Err(CombatError::InvalidTarget(target_id.to_string()));
        }
        require_action(&session.participants[helper])?;

        let helper_id = session.participants[helper].id().to_string();
        spend_action(&mut session.participants[helper]);

        let t = &mut session.participants[target];
        t.conditions.apply(
            self.conditions
                .instantiate(ConditionKind::Helped)
                .with_source(&helper_id),
        );

        Ok(ActionOutcome {
            success: true,
            targets: vec![t.character.name.clone()],
            effects: vec![ConditionKind::Helped.to_string()],
            ..Default::default()
        })
    }

    fn hide(
        &self,
        session: &mut CombatSession,
        actor: usize,
        dice: &mut dyn DiceSource,
    ) -> Result<ActionOutcome, CombatError> {
        require_action(&session.participants[actor])?;

        let stealth = RuleCheck::new(CheckKind::Skill, StatKey::Agility, self.rules.hide_dc)
            .with_modifiers(self.terrain_modifiers(session, actor));
        let p = &session.participants[actor];
        let world = session.world.as_ref();
        let result = self.perform_check(&p.character, &p.conditions, &stealth, world, dice);

        let p = &mut session.participants[actor];
        spend_action(p);
        let mut effects = Vec::new();
        if result.success {
            p.conditions
                .apply(self.conditions.instantiate(ConditionKind::Hidden));
            effects.push(ConditionKind::Hidden.to_string());
        }

        Ok(ActionOutcome {
            success: result.success,
            effects,
            check: Some(result),
            ..Default::default()
        })
    }
}
