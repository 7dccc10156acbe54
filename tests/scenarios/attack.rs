//! Attack scenario tests
//!
//! Tests to-hit against armor class, damage, criticals and resource use

use crate::common::{attack, goblin, warrior, Battle};
use mythrules::character::{Position, Weapon};
use mythrules::combat::{Action, CombatError, Resource};

/// Test: warrior hits a goblin with a forced 15 and a forced 5 damage die
#[test]
fn test_warrior_hits_goblin() {
    let mut battle = Battle::start(vec![warrior("w"), goblin("g")]);
    assert_eq!(battle.get("g").character.armor_class(), 13);

    let outcome = battle.act("w", attack("g"), [15, 5]).unwrap();

    assert!(outcome.success);
    assert!(!outcome.critical && !outcome.fumble);
    let check = outcome.check.as_ref().unwrap();
    assert_eq!(check.natural, 15);
    assert_eq!(check.total, 18);
    assert_eq!(outcome.damage, Some(8));
    assert_eq!(battle.health("g"), 2);
    assert_eq!(outcome.narrative, "Warrior hits Goblin for 8 damage");
}

/// Test: an attack spends exactly one action and touches no other pool
#[test]
fn test_attack_spends_one_action() {
    let mut battle = Battle::start(vec![warrior("w"), goblin("g"), goblin("g2")]);
    let before_w = battle.pools("w");
    let before_g = battle.pools("g");
    let before_g2 = battle.pools("g2");

    battle.act("w", attack("g"), [15, 5]).unwrap();

    let after_w = battle.pools("w");
    assert_eq!(after_w.0, before_w.0 - 1);
    assert_eq!((after_w.1, after_w.2, after_w.3), (before_w.1, before_w.2, before_w.3));
    assert_eq!(battle.pools("g"), before_g);
    assert_eq!(battle.pools("g2"), before_g2);

    // Still the warrior's turn, but no action left
    let err = battle.act("w", attack("g"), [15, 5]).unwrap_err();
    assert_eq!(
        err,
        CombatError::InsufficientResource {
            resource: Resource::Actions,
            needed: 1,
            available: 0,
        }
    );
}

/// Test: a miss deals no damage
#[test]
fn test_miss_against_armor() {
    let mut battle = Battle::start(vec![warrior("w"), goblin("g")]);

    // 9 + 3 = 12 < 13
    let outcome = battle.act("w", attack("g"), [9]).unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.damage, None);
    assert_eq!(battle.health("g"), 10);
    assert_eq!(outcome.narrative, "Warrior misses Goblin");
}

/// Test: a natural 20 hits any armor and rolls the weapon dice again
#[test]
fn test_critical_against_heavy_armor() {
    let mut battle = Battle::start(vec![warrior("w"), goblin("g").with_armor("plate", 20)]);

    let outcome = battle.act("w", attack("g"), [20, 4, 7]).unwrap();
    assert!(outcome.critical);
    // 4 + 3 strength + 7 second die
    assert_eq!(outcome.damage, Some(14));
    assert!(outcome.ended.is_some());
}

/// Test: enchantment and finesse feed the attack check
#[test]
fn test_enchanted_finesse_weapon() {
    let duelist = warrior("w").with_weapon(
        Weapon::new("rapier", "1d8".parse().unwrap())
            .with_enchantment(2)
            .finesse(),
    );
    let mut battle = Battle::start(vec![duelist, goblin("g")]);

    // 10 + 1 agility + 2 enchantment = 13
    let outcome = battle.act("w", attack("g"), [10, 1]).unwrap();
    let check = outcome.check.unwrap();
    assert_eq!(check.total, 13);
    assert!(outcome.success);
    assert!(check.modifiers.iter().any(|m| m.source == "enchantment"));
}

/// Test: only the active participant may act
#[test]
fn test_out_of_turn_attack() {
    let mut battle = Battle::start(vec![warrior("w"), goblin("g")]);

    let err = battle.act("g", attack("w"), [20]).unwrap_err();
    assert_eq!(err, CombatError::NotYourTurn("Goblin".to_string()));
    assert_eq!(battle.health("w"), 24);
}

/// Test: attacking a missing participant is rejected
#[test]
fn test_attack_unknown_target() {
    let mut battle = Battle::start(vec![warrior("w"), goblin("g")]);

    let err = battle.act("w", attack("dragon"), [20]).unwrap_err();
    assert_eq!(err, CombatError::InvalidTarget("dragon".to_string()));
    assert_eq!(battle.pools("w").0, 1);
}

/// Test: hiding grants advantage on the next attack, then the hider is revealed
#[test]
fn test_hidden_attacker_is_revealed() {
    let mut battle = Battle::start(vec![
        warrior("w").at(Position::new(-4.0, 0.0, 0.0)),
        goblin("g"),
    ]);

    // Stealth 18 + 1 beats DC 15
    let hide = battle.act("w", Action::Hide, [18]).unwrap();
    assert!(hide.success);
    battle.act("w", Action::EndTurn, []).unwrap();
    battle.act("g", Action::EndTurn, []).unwrap();

    let outcome = battle.act("w", attack("g"), [4, 16, 2]).unwrap();
    let check = outcome.check.unwrap();
    assert!(check.advantage);
    assert_eq!(check.natural, 16);
    assert!(!battle
        .get("w")
        .conditions
        .has(mythrules::combat::ConditionKind::Hidden));
}

/// Test: help only lands on allies
#[test]
fn test_help_enemy_rejected() {
    let mut battle = Battle::start(vec![warrior("w"), warrior("w2"), goblin("g")]);

    let err = battle
        .act(
            "w",
            Action::Help {
                target: "g".to_string(),
            },
            [],
        )
        .unwrap_err();
    assert_eq!(err, CombatError::InvalidTarget("g".to_string()));
    assert!(battle.get("g").conditions.is_empty());
    assert_eq!(battle.pools("w").0, 1);

    let outcome = battle
        .act(
            "w",
            Action::Help {
                target: "w2".to_string(),
            },
            [],
        )
        .unwrap();
    assert!(outcome.success);
    assert!(battle
        .get("w2")
        .conditions
        .has(mythrules::combat::ConditionKind::Helped));
}
