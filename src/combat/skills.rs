//! Named skills and the stat each is keyed to

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::character::{Character, StatKey, World};

use super::check::{CheckKind, CheckResult, RuleCheck};
use super::conditions::ConditionSet;
use super::dice::DiceSource;
use super::Engine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Skill {
    Acrobatics,
    Athletics,
    Deception,
    History,
    Insight,
    Intimidation,
    Investigation,
    Medicine,
    Perception,
    Persuasion,
    SleightOfHand,
    Stealth,
    Survival,
}

impl Skill {
    pub fn all() -> &'static [Skill] {
        &[
            Skill::Acrobatics,
            Skill::Athletics,
            Skill::Deception,
            Skill::History,
            Skill::Insight,
            Skill::Intimidation,
            Skill::Investigation,
            Skill::Medicine,
            Skill::Perception,
            Skill::Persuasion,
            Skill::SleightOfHand,
            Skill::Stealth,
            Skill::Survival,
        ]
    }

    pub fn stat(&self) -> StatKey {
        match self {
            Skill::Acrobatics | Skill::SleightOfHand | Skill::Stealth => StatKey::Agility,
            Skill::Athletics => StatKey::Strength,
            Skill::Deception | Skill::Intimidation | Skill::Persuasion => StatKey::Charisma,
            Skill::History | Skill::Investigation => StatKey::Intelligence,
            Skill::Insight | Skill::Medicine | Skill::Perception | Skill::Survival => {
                StatKey::Wisdom
            }
        }
    }

    /// A skill check against `difficulty`
    pub fn check(&self, difficulty: i32) -> RuleCheck {
        RuleCheck::new(CheckKind::Skill, self.stat(), difficulty)
    }
}

impl FromStr for Skill {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        Skill::all()
            .iter()
            .copied()
            .find(|skill| skill.to_string() == normalized)
            .ok_or(())
    }
}

impl std::fmt::Display for Skill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Skill::Acrobatics => "acrobatics",
            Skill::Athletics => "athletics",
            Skill::Deception => "deception",
            Skill::History => "history",
            Skill::Insight => "insight",
            Skill::Intimidation => "intimidation",
            Skill::Investigation => "investigation",
            Skill::Medicine => "medicine",
            Skill::Perception => "perception",
            Skill::Persuasion => "persuasion",
            Skill::SleightOfHand => "sleight_of_hand",
            Skill::Stealth => "stealth",
            Skill::Survival => "survival",
        };
        write!(f, "{}", s)
    }
}

impl Engine {
    /// Resolve a skill check outside of combat
    pub fn skill_check(
        &self,
        character: &Character,
        skill: Skill,
        difficulty: i32,
        world: Option<&World>,
        dice: &mut dyn DiceSource,
    ) -> CheckResult {
        self.perform_check(character, &ConditionSet::new(), &skill.check(difficulty), world, dice)
    }
}
