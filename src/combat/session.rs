//! Combat sessions
//!
//! A session owns its participants for the duration of combat:
//! - Initiative is rolled once and fixes the turn order
//! - Per-round pools (actions, bonus actions, reactions, movement) reset on wraparound
//! - Termination is detected when at most one faction has a living member

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info};
use uuid::Uuid;

use crate::character::{Character, Faction, Position, StatKey, World};
use crate::config::RulesConfig;

use super::check::RuleModifier;
use super::conditions::{ConditionKind, ConditionSet, EffectKind, StatusCondition, TickReport};
use super::dice::{DiceFormula, DiceSource};
use super::error::CombatError;
use super::Engine;

/// Opaque session identifier
pub type SessionId = Uuid;

/// A circular area on the battlefield
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Area {
    pub center: Position,
    pub radius_ft: f64,
}

impl Area {
    pub fn new(center: Position, radius_ft: f64) -> Self {
        Self { center, radius_ft }
    }

    pub fn contains(&self, position: &Position, feet_per_unit: f64) -> bool {
        self.center.distance_ft(position, feet_per_unit) <= self.radius_ft
    }
}

/// A terrain feature affecting checks and movement inside its area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainEffect {
    pub name: String,
    pub area: Area,
    /// Moving into difficult terrain costs double movement
    #[serde(default)]
    pub difficult: bool,
    /// Modifiers applied to checks made from inside the area
    #[serde(default)]
    pub modifiers: Vec<RuleModifier>,
}

/// A session-wide effect ticked at the start of each round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveEffect {
    pub id: String,
    pub name: String,
    /// Rounds remaining
    pub duration: u32,
    /// Participant ids affected
    pub targets: Vec<String>,
    pub kind: EffectKind,
}

impl ActiveEffect {
    pub fn new(name: &str, duration: u32, targets: Vec<String>, kind: EffectKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            duration,
            targets,
            kind,
        }
    }
}

/// A character taking part in combat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub character: Character,
    pub initiative: i32,
    pub actions: u32,
    pub bonus_actions: u32,
    pub reactions: u32,
    /// Remaining movement in feet
    pub movement: u32,
    pub conditions: ConditionSet,
}

impl Participant {
    pub fn id(&self) -> &str {
        &self.character.id
    }

    pub fn is_alive(&self) -> bool {
        self.character.is_alive()
    }

    pub fn faction(&self) -> Faction {
        self.character.faction()
    }

    /// Refill per-round pools
    pub fn reset_pools(&mut self, rules: &RulesConfig) {
        self.actions = rules.actions_per_turn;
        self.bonus_actions = rules.bonus_actions_per_turn;
        self.reactions = rules.reactions_per_turn;
        self.movement = movement_allowance(&self.character, rules);
    }

    /// Both action pools are spent
    pub fn turn_exhausted(&self) -> bool {
        self.actions == 0 && self.bonus_actions == 0
    }
}

/// Movement per round: base plus `(agility - 10)` feet
pub fn movement_allowance(character: &Character, rules: &RulesConfig) -> u32 {
    (rules.base_movement + (character.stats.agility - 10)).max(0) as u32
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Ended,
}

/// How a combat ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatSummary {
    /// Surviving faction, if any
    pub winner: Option<Faction>,
    pub survivors: Vec<String>,
    pub defeated: Vec<String>,
    /// Experience granted to each survivor
    pub xp_each: u64,
    pub rounds: u32,
}

/// Characters released by a finished or abandoned session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishedCombat {
    pub summary: Option<CombatSummary>,
    pub characters: Vec<Character>,
}

/// Result of ending a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnReport {
    /// Participant whose turn ended
    pub ended: String,
    /// Participant now acting
    pub next: String,
    pub round: u32,
    pub new_round: bool,
    pub ticks: TickReport,
    pub ended_combat: Option<CombatSummary>,
}

/// State of one combat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatSession {
    pub id: SessionId,
    /// Ordered by initiative, highest first
    pub participants: Vec<Participant>,
    pub current_turn: usize,
    pub round: u32,
    pub effects: Vec<ActiveEffect>,
    pub terrain: Vec<TerrainEffect>,
    pub world: Option<World>,
    pub status: SessionStatus,
    pub summary: Option<CombatSummary>,
    pub created_at: DateTime<Utc>,
}

impl CombatSession {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Participant whose turn it is
    pub fn current(&self) -> &Participant {
        self.assert_turn_in_range();
        &self.participants[self.current_turn]
    }

    pub(crate) fn current_mut(&mut self) -> &mut Participant {
        self.assert_turn_in_range();
        &mut self.participants[self.current_turn]
    }

    fn assert_turn_in_range(&self) {
        assert!(
            self.current_turn < self.participants.len(),
            "current_turn {} out of range for {} participants",
            self.current_turn,
            self.participants.len()
        );
    }

    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id() == id)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.participants.iter().position(|p| p.id() == id)
    }

    /// Factions with at least one living member
    pub fn living_factions(&self) -> BTreeSet<Faction> {
        self.participants
            .iter()
            .filter(|p| p.is_alive())
            .map(|p| p.faction())
            .collect()
    }

    /// Terrain features containing a position
    pub fn terrain_at<'a>(
        &'a self,
        position: &'a Position,
        feet_per_unit: f64,
    ) -> impl Iterator<Item = &'a TerrainEffect> + 'a {
        self.terrain
            .iter()
            .filter(move |t| t.area.contains(position, feet_per_unit))
    }

    /// Release the characters, clearing their combat conditions
    pub fn finish(&mut self) -> FinishedCombat {
        self.status = SessionStatus::Ended;
        let characters = std::mem::take(&mut self.participants)
            .into_iter()
            .map(|p| p.character)
            .collect();
        self.current_turn = 0;
        FinishedCombat {
            summary: self.summary.clone(),
            characters,
        }
    }
}

/// Initiative ordering: result desc, agility desc, submission order asc
fn initiative_order(a: &(usize, Participant), b: &(usize, Participant)) -> Ordering {
    b.1.initiative
        .cmp(&a.1.initiative)
        .then_with(|| b.1.character.stats.agility.cmp(&a.1.character.stats.agility))
        .then_with(|| a.0.cmp(&b.0))
}

impl Engine {
    /// Start a combat: roll initiative once per participant and order them
    pub fn initiate_combat(
        &self,
        characters: Vec<Character>,
        terrain: Vec<TerrainEffect>,
        world: Option<World>,
        dice: &mut dyn DiceSource,
    ) -> Result<CombatSession, CombatError> {
        let mut seen = HashSet::new();
        for c in &characters {
            if !seen.insert(c.id.clone()) {
                return Err(CombatError::DuplicateParticipant(c.id.clone()));
            }
        }

        let factions: BTreeSet<Faction> = characters
            .iter()
            .filter(|c| c.is_alive())
            .map(|c| c.faction())
            .collect();
        if factions.len() < 2 {
            return Err(CombatError::NoOpposition);
        }

        let mut entries: Vec<(usize, Participant)> = characters
            .into_iter()
            .enumerate()
            .map(|(index, character)| {
                let initiative =
                    DiceFormula::d20(character.ability_mod(StatKey::Agility)).roll(dice);
                let mut participant = Participant {
                    character,
                    initiative,
                    actions: 0,
                    bonus_actions: 0,
                    reactions: 0,
                    movement: 0,
                    conditions: ConditionSet::new(),
                };
                participant.reset_pools(&self.rules);
                (index, participant)
            })
            .collect();

        entries.sort_by(initiative_order);

        let mut session = CombatSession {
            id: Uuid::new_v4(),
            participants: entries.into_iter().map(|(_, p)| p).collect(),
            current_turn: 0,
            round: 1,
            effects: Vec::new(),
            terrain,
            world,
            status: SessionStatus::Active,
            summary: None,
            created_at: Utc::now(),
        };

        // Fallen characters never take a turn
        if !session.current().is_alive() {
            self.advance_turn(&mut session);
        }

        info!(
            "Combat {} initiated with {} participants",
            session.id,
            session.participants.len()
        );
        Ok(session)
    }

    /// End the current participant's turn
    ///
    /// Applies end-of-turn condition ticks and saves, advances to the next living
    /// participant, and on wraparound starts a new round.
    pub fn end_turn(
        &self,
        session: &mut CombatSession,
        dice: &mut dyn DiceSource,
    ) -> Result<TurnReport, CombatError> {
        if !session.is_active() {
            return Err(CombatError::SessionEnded);
        }

        let world = session.world;
        let current = session.current_mut();
        let ended = current.character.id.clone();
        let ticks = if current.is_alive() {
            let Participant {
                character,
                conditions,
                ..
            } = current;
            self.tick_conditions(character, conditions, world.as_ref(), dice)
        } else {
            TickReport::default()
        };

        let new_round = self.advance_turn(session);
        let ended_combat = self.evaluate_termination(session);

        Ok(TurnReport {
            ended,
            next: session
                .participants
                .get(session.current_turn)
                .map(|p| p.id().to_string())
                .unwrap_or_default(),
            round: session.round,
            new_round,
            ticks,
            ended_combat,
        })
    }

    /// Move to the next living participant; returns true if a new round began
    fn advance_turn(&self, session: &mut CombatSession) -> bool {
        let count = session.participants.len();
        let mut new_round = false;

        for _ in 0..count {
            session.current_turn += 1;
            if session.current_turn >= count {
                session.current_turn = 0;
                self.start_round(session);
                new_round = true;
            }
            if session.current().is_alive() {
                break;
            }
        }

        new_round
    }

    fn start_round(&self, session: &mut CombatSession) {
        session.round += 1;
        for participant in &mut session.participants {
            participant.reset_pools(&self.rules);
        }
        self.tick_session_effects(session);
        info!("Round {} begins in combat {}", session.round, session.id);
    }

    fn tick_session_effects(&self, session: &mut CombatSession) {
        let CombatSession {
            effects,
            participants,
            ..
        } = session;

        for effect in effects.iter_mut() {
            for participant in participants
                .iter_mut()
                .filter(|p| p.is_alive() && effect.targets.iter().any(|t| t == p.id()))
            {
                effect.kind.apply(&mut participant.character);
            }
            effect.duration = effect.duration.saturating_sub(1);
        }
        effects.retain(|e| e.duration > 0);
    }

    /// Apply a condition to a living participant
    ///
    /// Returns true if the condition is new; an existing one is refreshed.
    pub fn apply_condition(
        &self,
        session: &mut CombatSession,
        target_id: &str,
        condition: StatusCondition,
    ) -> Result<bool, CombatError> {
        if !session.is_active() {
            return Err(CombatError::SessionEnded);
        }
        let target = session
            .participants
            .iter_mut()
            .find(|p| p.id() == target_id && p.is_alive())
            .ok_or_else(|| CombatError::InvalidTarget(target_id.to_string()))?;

        debug!("{} gains {}", target_id, condition.name);
        Ok(target.conditions.apply(condition))
    }

    /// Remove a condition; returns whether it was present
    pub fn remove_condition(
        &self,
        session: &mut CombatSession,
        target_id: &str,
        name: ConditionKind,
    ) -> Result<bool, CombatError> {
        if !session.is_active() {
            return Err(CombatError::SessionEnded);
        }
        let target = session
            .participants
            .iter_mut()
            .find(|p| p.id() == target_id)
            .ok_or_else(|| CombatError::InvalidTarget(target_id.to_string()))?;
        Ok(target.conditions.remove(name))
    }

    /// Add a session-wide effect
    pub fn add_effect(
        &self,
        session: &mut CombatSession,
        effect: ActiveEffect,
    ) -> Result<(), CombatError> {
        if !session.is_active() {
            return Err(CombatError::SessionEnded);
        }
        if let Some(missing) = effect.targets.iter().find(|t| session.index_of(t).is_none()) {
            return Err(CombatError::InvalidTarget(missing.clone()));
        }
        session.effects.push(effect);
        Ok(())
    }

    /// End the session if at most one faction has a living member
    ///
    /// Experience `Σ(level × xp_per_level) / survivors` is granted to each survivor.
    pub fn evaluate_termination(&self, session: &mut CombatSession) -> Option<CombatSummary> {
        if !session.is_active() {
            return session.summary.clone();
        }

        let factions = session.living_factions();
        if factions.len() > 1 {
            return None;
        }

        let (survivors, defeated): (Vec<&mut Participant>, Vec<&mut Participant>) =
            session.participants.iter_mut().partition(|p| p.is_alive());

        let pool: u64 = defeated
            .iter()
            .map(|p| p.character.level as u64 * self.rules.xp_per_level)
            .sum();
        let xp_each = if survivors.is_empty() {
            0
        } else {
            pool / survivors.len() as u64
        };

        let summary = CombatSummary {
            winner: factions.into_iter().next(),
            survivors: survivors.iter().map(|p| p.id().to_string()).collect(),
            defeated: defeated.iter().map(|p| p.id().to_string()).collect(),
            xp_each,
            rounds: session.round,
        };

        for survivor in survivors {
            survivor.character.experience += xp_each;
        }
        for participant in &mut session.participants {
            participant.conditions.clear();
        }

        info!(
            "Combat {} ended; survivors: {}; defeated: {}",
            session.id,
            summary.survivors.join(", "),
            summary.defeated.join(", ")
        );

        session.status = SessionStatus::Ended;
        session.summary = Some(summary.clone());
        Some(summary)
    }
}
