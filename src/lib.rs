//! mythrules - turn-based combat and ability-check rules engine
//!
//! Resolves d20 checks against characters supplied by the caller and runs
//! initiative-ordered combat sessions. All randomness comes from an injected
//! [`DiceSource`](combat::DiceSource), so any run can be replayed from a seed.

pub mod character;
pub mod combat;
pub mod config;
pub mod scenario;
pub mod store;

pub use character::{Character, Position, StatKey, Stats, World};
pub use combat::{Action, CombatError, CombatSession, DiceFormula, Engine};
pub use config::{Config, RulesConfig};
pub use store::SessionStore;
