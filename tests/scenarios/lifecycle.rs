//! Lifecycle scenario tests
//!
//! Tests termination, experience rewards, abandonment and the session store

use crate::common::{attack, goblin, warrior, Battle};
use mythrules::character::Faction;
use mythrules::combat::{Action, CombatError, ConditionKind, SeededDice, SessionStatus};
use mythrules::{Engine, SessionStore};

/// Test: two opposing survivors who only pass never end the combat
#[test]
fn test_no_self_termination() {
    let mut battle = Battle::start(vec![warrior("w"), goblin("g")]);

    for _ in 0..50 {
        let report = battle.end_turn(10);
        assert!(report.ended_combat.is_none());
    }
    assert_eq!(battle.session.status, SessionStatus::Active);
    assert_eq!(battle.session.round, 26);
}

/// Test: the killing blow ends the combat within the same call
#[test]
fn test_last_hit_point_ends_combat() {
    let mut battle = Battle::start(vec![warrior("w").with_level(3), goblin("g").with_level(2)]);
    battle.session.participants[1].character.stats.health = 3;

    let outcome = battle.act("w", attack("g"), [15, 1]).unwrap();

    let summary = outcome.ended.expect("combat should have ended");
    assert_eq!(summary.winner, Some(Faction::Good));
    assert_eq!(summary.survivors, vec!["w".to_string()]);
    assert_eq!(summary.defeated, vec!["g".to_string()]);
    assert_eq!(summary.xp_each, 200);
    assert_eq!(battle.session.status, SessionStatus::Ended);
    assert_eq!(battle.get("w").character.experience, 200);

    let err = battle.act("w", Action::Dodge, []).unwrap_err();
    assert_eq!(err, CombatError::SessionEnded);
}

/// Test: experience splits evenly and floors
#[test]
fn test_experience_split_between_survivors() {
    let mut battle = Battle::start(vec![
        warrior("w1"),
        warrior("w2"),
        warrior("w3"),
        goblin("g").with_level(2),
    ]);
    battle.session.participants[3].character.stats.health = 1;

    let outcome = battle.act("w1", attack("g"), [15, 1]).unwrap();
    let summary = outcome.ended.unwrap();
    assert_eq!(summary.xp_each, 66);

    let finished = battle.session.finish();
    assert!(finished
        .characters
        .iter()
        .filter(|c| c.id.starts_with('w'))
        .all(|c| c.experience == 66));
}

/// Test: combat state is cleared from characters handed back
#[test]
fn test_conditions_cleared_on_end() {
    let mut battle = Battle::start(vec![warrior("w"), goblin("g")]);
    battle.act("w", Action::Dodge, []).unwrap();
    assert!(battle.get("w").conditions.has(ConditionKind::Dodging));
    battle.session.participants[1].character.stats.health = 0;

    battle.act("w", Action::EndTurn, []).unwrap();
    assert_eq!(battle.session.status, SessionStatus::Ended);
    assert!(battle.get("w").conditions.is_empty());
}

/// Test: a seeded duel runs to completion through the store
#[test]
fn test_seeded_duel_through_store() {
    let engine = Engine::default();
    let store = SessionStore::new();
    let mut dice = SeededDice::from_seed(7);

    let id = store
        .start(&engine, vec![warrior("w"), goblin("g")], Vec::new(), None, &mut dice)
        .unwrap();

    let mut finished = None;
    for _ in 0..200 {
        let session = store.get(id).expect("session should still be stored");
        let actor = session.current().id().to_string();
        let target = if actor == "w" { "g" } else { "w" };

        let submission = store
            .submit(&engine, id, &actor, attack(target), &mut dice)
            .unwrap();
        if submission.finished.is_some() {
            finished = submission.finished;
            break;
        }

        let submission = store
            .submit(&engine, id, &actor, Action::EndTurn, &mut dice)
            .unwrap();
        if submission.finished.is_some() {
            finished = submission.finished;
            break;
        }
    }

    let finished = finished.expect("duel should finish");
    let summary = finished.summary.unwrap();
    assert_eq!(summary.survivors.len(), 1);
    assert_eq!(summary.xp_each, 100);
    assert!(store.is_empty());
    assert!(store.get(id).is_none());
}

/// Test: abandoning hands back characters with no reward
#[test]
fn test_abandon_session() {
    let engine = Engine::default();
    let store = SessionStore::new();
    let mut dice = SeededDice::from_seed(1);

    let id = store
        .start(&engine, vec![warrior("w"), goblin("g")], Vec::new(), None, &mut dice)
        .unwrap();
    let other = store
        .start(&engine, vec![warrior("w"), goblin("g")], Vec::new(), None, &mut dice)
        .unwrap();
    assert_eq!(store.len(), 2);

    let finished = store.abandon(id).unwrap();
    assert!(finished.summary.is_none());
    assert!(finished.characters.iter().all(|c| c.experience == 0));
    assert_eq!(store.list(), vec![other]);

    let err = store
        .submit(&engine, id, "w", Action::Dodge, &mut dice)
        .unwrap_err();
    assert_eq!(err, CombatError::SessionNotFound(id.to_string()));
}
