//! Narrative rendering contract
//!
//! The engine only guarantees the flags that drive a narrative; the text
//! itself comes from a pluggable renderer.

use crate::character::Character;

use super::actions::{Action, ActionOutcome};
use super::check::CheckKind;

/// Turns check and action results into display strings
pub trait NarrativeRenderer: Send + Sync {
    fn check(
        &self,
        character: &Character,
        kind: CheckKind,
        success: bool,
        critical: bool,
        fumble: bool,
    ) -> String;

    fn action(&self, actor: &Character, action: &Action, outcome: &ActionOutcome) -> String;
}

/// Plain one-line narration
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainNarrator;

impl NarrativeRenderer for PlainNarrator {
    fn check(
        &self,
        character: &Character,
        kind: CheckKind,
        success: bool,
        critical: bool,
        fumble: bool,
    ) -> String {
        if critical {
            format!("{} achieves a legendary {} success!", character.name, kind)
        } else if fumble {
            format!("{} suffers a catastrophic {} failure!", character.name, kind)
        } else if success {
            format!("{} succeeds at the {} check", character.name, kind)
        } else {
            format!("{} fails the {} check", character.name, kind)
        }
    }

    fn action(&self, actor: &Character, action: &Action, outcome: &ActionOutcome) -> String {
        let name = &actor.name;
        let target = outcome.targets.first().map(String::as_str).unwrap_or("the foe");

        match action {
            Action::Attack { .. } => match outcome.damage {
                Some(damage) if outcome.critical => {
                    format!("CRITICAL HIT! {} devastates {} for {} damage!", name, target, damage)
                }
                Some(damage) => format!("{} hits {} for {} damage", name, target, damage),
                None => format!("{} misses {}", name, target),
            },
            Action::Spell { spell, .. } => {
                let landed = outcome.targets.join(", ");
                match (landed.is_empty(), outcome.damage) {
                    (true, _) if !outcome.resisted.is_empty() => format!(
                        "{} resists {}'s {}!",
                        outcome.resisted.join(", "),
                        name,
                        spell.name
                    ),
                    (true, _) => format!("{} casts {}", name, spell.name),
                    (false, Some(damage)) => format!(
                        "{} casts {} on {} for {} damage",
                        name, spell.name, landed, damage
                    ),
                    (false, None) => format!("{} casts {} on {}", name, spell.name, landed),
                }
            }
            Action::Move { .. } if outcome.success => format!("{} moves to a new position", name),
            Action::Move { .. } => format!("{} is cut down while moving", name),
            Action::Dodge => format!("{} takes the Dodge action", name),
            Action::Disengage => format!("{} disengages", name),
            Action::Help { .. } => format!("{} helps {}", name, target),
            Action::Hide if outcome.success => format!("{} successfully hides", name),
            Action::Hide => format!("{} fails to hide", name),
            Action::EndTurn => format!("{} ends their turn", name),
        }
    }
}
