//! Scenario tests for the rules engine
//!
//! - Attack: to-hit, damage, criticals and resource use
//! - Spells: mana, saves and areas
//! - Conditions: periodic effects, saves and durations
//! - Lifecycle: termination, rewards and the session store

pub mod attack;
pub mod conditions;
pub mod lifecycle;
pub mod spells;
