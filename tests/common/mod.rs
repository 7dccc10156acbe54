//! Common test utilities - character fixtures and a Battle harness over the engine

#![allow(dead_code)]

use mythrules::character::{Alignment, Character, Position, Stats, Weapon};
use mythrules::combat::{
    Action, ActionOutcome, CombatError, CombatSession, Participant, ScriptedDice, TurnReport,
};
use mythrules::Engine;

/// A good-aligned warrior: strength 16, agility 12, 1d8 longsword
pub fn warrior(id: &str) -> Character {
    Character::new(id, "Warrior")
        .with_alignment(Alignment::new(0.6, 0.8))
        .with_stats(Stats {
            strength: 16,
            agility: 12,
            health: 24,
            max_health: 24,
            ..Stats::default()
        })
        .with_weapon(Weapon::new("longsword", "1d8".parse().unwrap()))
}

/// An evil goblin with AC 13 (agility 12 plus leather armor)
pub fn goblin(id: &str) -> Character {
    Character::new(id, "Goblin")
        .with_race("goblin")
        .with_alignment(Alignment::new(-0.5, -0.7))
        .with_stats(Stats {
            strength: 8,
            agility: 12,
            health: 10,
            max_health: 10,
            ..Stats::default()
        })
        .with_armor("leather", 2)
        .at(Position::new(1.0, 0.0, 0.0))
}

/// A good-aligned mage with the given mana
pub fn mage(id: &str, mana: i32) -> Character {
    Character::new(id, "Mage")
        .with_archetype(mythrules::character::ClassArchetype::Mage)
        .with_alignment(Alignment::new(0.0, 0.5))
        .with_stats(Stats {
            intelligence: 16,
            health: 14,
            max_health: 14,
            mana,
            max_mana: mana.max(20),
            ..Stats::default()
        })
}

/// A session under test, with participants acting in roster order
pub struct Battle {
    pub engine: Engine,
    pub session: CombatSession,
}

impl Battle {
    /// Start combat; initiative faces descend in steps of 3 so the roster
    /// order survives small agility modifiers
    pub fn start(roster: Vec<Character>) -> Self {
        let engine = Engine::default();
        let faces: Vec<u32> = (0..roster.len() as u32).map(|i| 20 - 3 * i).collect();
        let session = engine
            .initiate_combat(roster, Vec::new(), None, &mut ScriptedDice::new(faces))
            .expect("Failed to initiate combat");
        Self { engine, session }
    }

    /// Submit an action with scripted die faces
    pub fn act(
        &mut self,
        actor: &str,
        action: Action,
        faces: impl IntoIterator<Item = u32>,
    ) -> Result<ActionOutcome, CombatError> {
        let mut dice = ScriptedDice::new(faces);
        self.engine
            .process_action(&mut self.session, actor, action, &mut dice)
    }

    /// End the current turn, rolling every save with the same face
    pub fn end_turn(&mut self, face: u32) -> TurnReport {
        self.engine
            .end_turn(&mut self.session, &mut ScriptedDice::repeat(face))
            .expect("Failed to end turn")
    }

    pub fn get(&self, id: &str) -> &Participant {
        self.session
            .participant(id)
            .unwrap_or_else(|| panic!("no participant {}", id))
    }

    pub fn health(&self, id: &str) -> i32 {
        self.get(id).character.stats.health
    }

    /// (actions, bonus actions, reactions, movement)
    pub fn pools(&self, id: &str) -> (u32, u32, u32, u32) {
        let p = self.get(id);
        (p.actions, p.bonus_actions, p.reactions, p.movement)
    }
}

pub fn attack(target: &str) -> Action {
    Action::Attack {
        target: target.to_string(),
    }
}
