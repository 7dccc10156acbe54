//! Configuration
//!
//! Layered with figment: built-in defaults, then an optional TOML file,
//! then `MYTHRULES_`-prefixed environment variables (nested keys split on `__`,
//! e.g. `MYTHRULES_RULES__HIDE_DC=12`).

use std::path::Path;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::combat::DiceFormula;

/// Default config file looked up when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "mythrules.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "MYTHRULES_";

/// Errors loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),
}

/// Numeric constants used by the rules engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Proficiency added to spell save DCs
    pub proficiency_bonus: i32,
    /// Movement before the agility adjustment, in feet
    pub base_movement: i32,
    /// Feet per grid unit
    pub feet_per_unit: f64,
    /// Reach within which a hostile counts as adjacent, in feet
    pub melee_reach_ft: f64,
    /// Stealth DC for the hide action
    pub hide_dc: i32,
    /// Experience per level of each defeated participant
    pub xp_per_level: u64,
    /// Outcome bias is clamped to `[-bias_cap, bias_cap]`
    pub bias_cap: i32,
    /// Health fraction under which the desperation bonus applies
    pub desperation_threshold: f64,
    pub desperation_bonus: i32,
    /// Damage for attacks without a weapon
    pub unarmed_damage: DiceFormula,
    /// Damage for spells that name none
    pub default_spell_damage: DiceFormula,
    pub mana_per_spell_level: i32,
    pub high_ground_bonus: i32,
    pub actions_per_turn: u32,
    pub bonus_actions_per_turn: u32,
    pub reactions_per_turn: u32,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            proficiency_bonus: 2,
            base_movement: 30,
            feet_per_unit: 5.0,
            melee_reach_ft: 5.0,
            hide_dc: 15,
            xp_per_level: 100,
            bias_cap: 5,
            desperation_threshold: 0.2,
            desperation_bonus: 3,
            unarmed_damage: DiceFormula::new(1, 4, 0),
            default_spell_damage: DiceFormula::new(2, 6, 0),
            mana_per_spell_level: 5,
            high_ground_bonus: 2,
            actions_per_turn: 1,
            bonus_actions_per_turn: 1,
            reactions_per_turn: 1,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// tracing filter used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Default RNG seed; unseeded runs draw from the thread RNG
    pub seed: Option<u64>,
    pub rules: RulesConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: "mythrules=info".to_string(),
            seed: None,
            rules: RulesConfig::default(),
        }
    }
}

impl Config {
    /// Build the figment for an optional config file
    pub fn figment(path: Option<&Path>) -> Figment {
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load configuration; a missing file falls back to defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::figment(path)
            .extract()
            .map_err(|e| ConfigError::Figment(Box::new(e)))
    }
}
