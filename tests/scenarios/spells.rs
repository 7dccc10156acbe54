//! Spell scenario tests
//!
//! Tests mana costs, saving throws and area spells

use crate::common::{goblin, mage, Battle};
use mythrules::character::{Position, StatKey};
use mythrules::combat::{Action, Area, CombatError, ConditionKind, Resource, Spell};

fn cast(spell: Spell, target: Option<&str>) -> Action {
    Action::Spell {
        spell,
        target: target.map(str::to_string),
    }
}

/// Test: a mage with 8 mana cannot cast a level 2 spell
#[test]
fn test_not_enough_mana() {
    let mut battle = Battle::start(vec![mage("m", 8), goblin("g")]);

    let err = battle
        .act("m", cast(Spell::new("Scorching Ray", 2), Some("g")), [1])
        .unwrap_err();

    assert_eq!(
        err,
        CombatError::InsufficientResource {
            resource: Resource::Mana,
            needed: 10,
            available: 8,
        }
    );
    assert!(err.to_string().contains("not enough mana"));
    assert_eq!(battle.get("m").character.stats.mana, 8);
    assert_eq!(battle.pools("m").0, 1);
    assert_eq!(battle.health("g"), 10);
}

/// Test: an absurd spell level is unaffordable rather than free
#[test]
fn test_huge_spell_level_cannot_be_cast() {
    let mut battle = Battle::start(vec![mage("m", 8), goblin("g")]);

    let spell: Spell = serde_json::from_str(r#"{"name":"Wish","level":4294967295}"#).unwrap();
    let err = battle.act("m", cast(spell, Some("g")), [1]).unwrap_err();

    assert_eq!(
        err,
        CombatError::InsufficientResource {
            resource: Resource::Mana,
            needed: 21_474_836_475,
            available: 8,
        }
    );
    assert_eq!(battle.get("m").character.stats.mana, 8);
    assert_eq!(battle.pools("m").0, 1);
}

/// Test: mana is spent whether or not the target saves
#[test]
fn test_mana_spent_on_resisted_spell() {
    let mut battle = Battle::start(vec![mage("m", 12), goblin("g")]);

    // DC 8 + 3 + 2 = 13; goblin agility save 19 + 1
    let spell = Spell::new("Frost Ray", 1).with_save(StatKey::Agility);
    let outcome = battle.act("m", cast(spell, Some("g")), [19]).unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.damage, None);
    assert_eq!(outcome.narrative, "Goblin resists Mage's Frost Ray!");
    assert_eq!(battle.get("m").character.stats.mana, 7);
    assert_eq!(battle.health("g"), 10);
}

/// Test: a failed save takes the spell's damage
#[test]
fn test_failed_save_takes_damage() {
    let mut battle = Battle::start(vec![mage("m", 10), goblin("g")]);

    let spell = Spell::new("Fire Bolt", 1).with_damage("1d10".parse().unwrap());
    let outcome = battle.act("m", cast(spell, Some("g")), [3, 6]).unwrap();

    assert_eq!(outcome.damage, Some(6));
    assert_eq!(battle.health("g"), 4);
    assert_eq!(outcome.narrative, "Mage casts Fire Bolt on Goblin for 6 damage");
}

/// Test: an area spell makes everyone inside save separately
#[test]
fn test_area_spell_saves_individually() {
    let mut battle = Battle::start(vec![
        mage("m", 20),
        goblin("g1").at(Position::new(5.0, 0.0, 0.0)),
        goblin("g2").at(Position::new(6.0, 0.0, 0.0)),
        goblin("g3").at(Position::new(20.0, 0.0, 0.0)),
    ]);

    let spell = Spell::new("Fireball", 3)
        .with_damage("2d6".parse().unwrap())
        .with_save(StatKey::Agility)
        .with_area(Area::new(Position::new(5.5, 0.0, 0.0), 10.0));

    // g1 saves with 15, g2 fails with 2 and takes 3 + 4
    let outcome = battle.act("m", cast(spell, None), [15, 2, 3, 4]).unwrap();

    assert_eq!(outcome.resisted, vec!["Goblin".to_string()]);
    assert_eq!(outcome.targets, vec!["Goblin".to_string()]);
    assert_eq!(outcome.damage, Some(7));
    assert_eq!(battle.health("g1"), 10);
    assert_eq!(battle.health("g2"), 3);
    assert_eq!(battle.health("g3"), 10);
    assert_eq!(battle.get("m").character.stats.mana, 5);
}

/// Test: a charm spell records its caster as the source
#[test]
fn test_charm_binds_to_caster() {
    let mut battle = Battle::start(vec![mage("m", 10), goblin("g")]);

    let spell = Spell::new("Charm", 1).inflicting(ConditionKind::Charmed);
    let outcome = battle.act("m", cast(spell, Some("g")), [2]).unwrap();

    assert_eq!(outcome.damage, None);
    assert_eq!(outcome.effects, vec!["Goblin is charmed".to_string()]);
    let goblin = battle.get("g");
    assert!(goblin.conditions.charmed_by("m"));
}

/// Test: a bonus action spell leaves the action available
#[test]
fn test_bonus_action_spell() {
    let mut battle = Battle::start(vec![mage("m", 10), goblin("g")]);

    let spell = Spell::new("Misty Step", 0).as_bonus_action();
    let outcome = battle.act("m", cast(spell, None), []).unwrap();

    assert!(outcome.success);
    assert!(!outcome.turn_ended);
    assert_eq!(battle.pools("m").0, 1);
    assert_eq!(battle.pools("m").1, 0);
    assert_eq!(battle.get("m").character.stats.mana, 10);

    // Spending the action as well ends the turn
    let outcome = battle.act("m", Action::Dodge, []).unwrap();
    assert!(outcome.turn_ended);
    assert_eq!(battle.session.current().id(), "g");
}
