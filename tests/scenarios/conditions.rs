//! Condition scenario tests
//!
//! Tests periodic damage, saves and duration countdowns across turns

use crate::common::{goblin, warrior, Battle};
use mythrules::combat::{Action, CombatError, ConditionKind, Duration, StatusCondition};

/// Test: poison deals 2 per tick and counts down once per bearer turn
#[test]
fn test_poison_ticks_on_failed_saves() {
    let mut battle = Battle::start(vec![warrior("w"), goblin("g")]);
    let poison = battle
        .engine
        .conditions()
        .instantiate(ConditionKind::Poisoned)
        .with_source("g");
    assert_eq!(poison.duration, Duration::Ticks(10));

    battle
        .engine
        .apply_condition(&mut battle.session, "w", poison)
        .unwrap();

    for tick in 1..=5 {
        // Natural 1 always fails the constitution save
        let report = battle.end_turn(1);
        assert_eq!(report.ended, "w");
        assert_eq!(report.ticks.damage, 2);
        assert_eq!(battle.health("w"), 24 - 2 * tick);
        battle.end_turn(1);
    }

    let poisoned = battle.get("w").conditions.get(ConditionKind::Poisoned).unwrap();
    assert_eq!(poisoned.duration, Duration::Ticks(5));
    assert_eq!(battle.health("g"), 10);
}

/// Test: a successful save ends poison early
#[test]
fn test_poison_save_ends_it() {
    let mut battle = Battle::start(vec![warrior("w"), goblin("g")]);
    let poison = battle.engine.conditions().instantiate(ConditionKind::Poisoned);
    battle
        .engine
        .apply_condition(&mut battle.session, "w", poison)
        .unwrap();

    let report = battle.end_turn(17);
    assert_eq!(report.ticks.damage, 2);
    assert_eq!(report.ticks.saved, vec![ConditionKind::Poisoned]);
    assert!(battle.get("w").conditions.is_empty());
}

/// Test: a two tick condition is gone after exactly two bearer turns
#[test]
fn test_two_tick_condition_expires() {
    let mut battle = Battle::start(vec![warrior("w"), goblin("g")]);
    battle
        .engine
        .apply_condition(
            &mut battle.session,
            "w",
            StatusCondition::new(ConditionKind::Blessed, Duration::Ticks(2)),
        )
        .unwrap();

    battle.end_turn(10);
    battle.end_turn(10);
    assert!(battle.get("w").conditions.has(ConditionKind::Blessed));

    battle.end_turn(10);
    assert!(!battle.get("w").conditions.has(ConditionKind::Blessed));
}

/// Test: reapplying refreshes instead of stacking
#[test]
fn test_reapply_refreshes_duration() {
    let mut battle = Battle::start(vec![warrior("w"), goblin("g")]);
    let engine = &battle.engine;

    let first = engine
        .apply_condition(
            &mut battle.session,
            "g",
            StatusCondition::new(ConditionKind::Frightened, Duration::Ticks(2)),
        )
        .unwrap();
    let second = engine
        .apply_condition(
            &mut battle.session,
            "g",
            StatusCondition::new(ConditionKind::Frightened, Duration::Ticks(4)),
        )
        .unwrap();

    assert!(first);
    assert!(!second);
    let goblin = battle.get("g");
    assert_eq!(goblin.conditions.len(), 1);
    assert_eq!(
        goblin.conditions.get(ConditionKind::Frightened).unwrap().duration,
        Duration::Ticks(4)
    );
}

/// Test: a paralyzed participant can only pass
#[test]
fn test_paralyzed_cannot_act() {
    let mut battle = Battle::start(vec![warrior("w"), goblin("g")]);
    let paralysis = battle.engine.conditions().instantiate(ConditionKind::Paralyzed);
    battle
        .engine
        .apply_condition(&mut battle.session, "w", paralysis)
        .unwrap();

    let err = battle
        .act("w", Action::Attack { target: "g".to_string() }, [20])
        .unwrap_err();
    assert_eq!(err, CombatError::Incapacitated("Warrior".to_string()));

    // Constitution save 13 + 1 (lawful) fails DC 15
    let outcome = battle.act("w", Action::EndTurn, [13]).unwrap();
    assert!(outcome.turn_ended);
    assert!(battle.get("w").conditions.has(ConditionKind::Paralyzed));
}

/// Test: conditions cannot be applied to the fallen
#[test]
fn test_condition_on_dead_participant() {
    let mut battle = Battle::start(vec![warrior("w"), goblin("g"), goblin("g2")]);
    battle.session.participants[1].character.stats.health = 0;

    let err = battle
        .engine
        .apply_condition(
            &mut battle.session,
            "g",
            StatusCondition::new(ConditionKind::Blinded, Duration::UntilRemoved),
        )
        .unwrap_err();
    assert_eq!(err, CombatError::InvalidTarget("g".to_string()));
}
