//! Outcome adjustor
//!
//! A small contextual bias on checks from personality, alignment, world genre
//! and desperation. Pure and deterministic; never a source of randomness.

use crate::character::{Character, Genre, StatKey, World};
use crate::config::RulesConfig;

use super::check::{CheckKind, RuleCheck};

/// Trait level above which personality bonuses apply
const TRAIT_THRESHOLD: f64 = 0.7;

/// Compute the bias for a check, clamped to `[-bias_cap, bias_cap]`
pub fn outcome_bias(
    character: &Character,
    check: &RuleCheck,
    world: Option<&World>,
    rules: &RulesConfig,
) -> i32 {
    let mut bias = 0;

    if let Some(personality) = &character.personality {
        // Brave characters hold firm on saves
        if check.kind == CheckKind::Save && personality.courage > TRAIT_THRESHOLD {
            bias += 2;
        }
        if check.kind == CheckKind::Skill && personality.curiosity > TRAIT_THRESHOLD {
            bias += 1;
        }
    }

    if character.alignment.is_lawful() && check.kind == CheckKind::Save {
        bias += 1;
    }

    if let Some(world) = world {
        bias += match (world.genre, check.kind, check.stat) {
            (Genre::Fantasy, CheckKind::Ability, StatKey::Wisdom) => 1,
            (Genre::SciFi, CheckKind::Skill, StatKey::Intelligence) => 1,
            (Genre::Horror, CheckKind::Save, StatKey::Wisdom) => -2,
            _ => 0,
        };
    }

    if character.is_desperate(rules.desperation_threshold) {
        bias += rules.desperation_bonus;
    }

    bias.clamp(-rules.bias_cap, rules.bias_cap)
}
