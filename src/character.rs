//! Character and world data consumed by the rules engine
//!
//! The engine never creates or persists characters. Callers hand them in,
//! the combat session mutates health/mana/position/experience, and the
//! characters are handed back when the session ends.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::combat::DiceFormula;

/// Ability score keys a check can be made against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatKey {
    Strength,
    Agility,
    Intelligence,
    Wisdom,
    Charisma,
    Constitution,
}

impl FromStr for StatKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strength" | "str" => Ok(StatKey::Strength),
            "agility" | "dexterity" | "agi" | "dex" => Ok(StatKey::Agility),
            "intelligence" | "int" => Ok(StatKey::Intelligence),
            "wisdom" | "wis" => Ok(StatKey::Wisdom),
            "charisma" | "cha" => Ok(StatKey::Charisma),
            "constitution" | "con" => Ok(StatKey::Constitution),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for StatKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StatKey::Strength => "strength",
            StatKey::Agility => "agility",
            StatKey::Intelligence => "intelligence",
            StatKey::Wisdom => "wisdom",
            StatKey::Charisma => "charisma",
            StatKey::Constitution => "constitution",
        };
        write!(f, "{}", s)
    }
}

/// Standard ability modifier: `floor((score - 10) / 2)`
pub fn ability_modifier(score: i32) -> i32 {
    (score - 10).div_euclid(2)
}

/// Character statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub strength: i32,
    pub agility: i32,
    pub intelligence: i32,
    pub wisdom: i32,
    pub charisma: i32,
    pub constitution: i32,
    pub health: i32,
    pub max_health: i32,
    pub mana: i32,
    pub max_mana: i32,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            strength: 10,
            agility: 10,
            intelligence: 10,
            wisdom: 10,
            charisma: 10,
            constitution: 10,
            health: 10,
            max_health: 10,
            mana: 0,
            max_mana: 0,
        }
    }
}

impl Stats {
    /// Raw ability score for a key
    pub fn get(&self, key: StatKey) -> i32 {
        match key {
            StatKey::Strength => self.strength,
            StatKey::Agility => self.agility,
            StatKey::Intelligence => self.intelligence,
            StatKey::Wisdom => self.wisdom,
            StatKey::Charisma => self.charisma,
            StatKey::Constitution => self.constitution,
        }
    }

    /// Ability modifier for a key
    pub fn modifier(&self, key: StatKey) -> i32 {
        ability_modifier(self.get(key))
    }
}

/// Class archetypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassArchetype {
    #[default]
    Warrior,
    Mage,
    Rogue,
    Healer,
    Ranger,
    Paladin,
    Necromancer,
    Bard,
}

/// Alignment on two axes, each in `[-1, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alignment {
    /// -1 chaotic .. 1 lawful
    pub law_chaos: f64,
    /// -1 evil .. 1 good
    pub good_evil: f64,
}

impl Alignment {
    pub fn new(law_chaos: f64, good_evil: f64) -> Self {
        Self { law_chaos, good_evil }
    }

    /// Combat faction derived from the good/evil axis
    pub fn faction(&self) -> Faction {
        if self.good_evil > 0.0 {
            Faction::Good
        } else {
            Faction::Evil
        }
    }

    pub fn is_lawful(&self) -> bool {
        self.law_chaos > 0.5
    }
}

/// Sides in a combat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Faction {
    Good,
    Evil,
}

/// Personality traits, each in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Personality {
    pub courage: f64,
    pub curiosity: f64,
    pub greed: f64,
    pub empathy: f64,
    pub aggression: f64,
}

/// Grid position; one unit is one 5ft square
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance in grid units
    pub fn distance(&self, other: &Position) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Distance in feet
    pub fn distance_ft(&self, other: &Position, feet_per_unit: f64) -> f64 {
        self.distance(other) * feet_per_unit
    }

    /// Grid adjacency: within `reach_ft` on every axis, so diagonals count
    pub fn within_reach(&self, other: &Position, reach_ft: f64, feet_per_unit: f64) -> bool {
        let dx = (other.x - self.x).abs();
        let dy = (other.y - self.y).abs();
        let dz = (other.z - self.z).abs();
        dx.max(dy).max(dz) * feet_per_unit <= reach_ft
    }
}

/// A wielded weapon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    pub name: String,
    pub damage: DiceFormula,
    #[serde(default)]
    pub enchantment: i32,
    /// Finesse weapons attack with agility instead of strength
    #[serde(default)]
    pub finesse: bool,
}

impl Weapon {
    pub fn new(name: &str, damage: DiceFormula) -> Self {
        Self {
            name: name.to_string(),
            damage,
            enchantment: 0,
            finesse: false,
        }
    }

    pub fn with_enchantment(mut self, bonus: i32) -> Self {
        self.enchantment = bonus;
        self
    }

    pub fn finesse(mut self) -> Self {
        self.finesse = true;
        self
    }
}

/// Worn armor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Armor {
    pub name: String,
    pub ac: i32,
}

/// Equipment slots read during attack resolution
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Equipment {
    pub weapon: Option<Weapon>,
    pub armor: Option<Armor>,
}

/// A character as supplied by the character provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub name: String,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub experience: u64,
    #[serde(default)]
    pub stats: Stats,
    #[serde(default)]
    pub archetype: ClassArchetype,
    /// Race identifier, e.g. "elf"
    #[serde(default)]
    pub race: String,
    #[serde(default)]
    pub alignment: Alignment,
    #[serde(default)]
    pub personality: Option<Personality>,
    #[serde(default)]
    pub equipment: Equipment,
    #[serde(default)]
    pub position: Position,
}

fn default_level() -> u32 {
    1
}

impl Character {
    /// Create a level 1 human warrior with average stats
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            level: 1,
            experience: 0,
            stats: Stats::default(),
            archetype: ClassArchetype::default(),
            race: "human".to_string(),
            alignment: Alignment::default(),
            personality: None,
            equipment: Equipment::default(),
            position: Position::default(),
        }
    }

    pub fn with_stats(mut self, stats: Stats) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_archetype(mut self, archetype: ClassArchetype) -> Self {
        self.archetype = archetype;
        self
    }

    pub fn with_race(mut self, race: &str) -> Self {
        self.race = race.to_string();
        self
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_personality(mut self, personality: Personality) -> Self {
        self.personality = Some(personality);
        self
    }

    pub fn with_weapon(mut self, weapon: Weapon) -> Self {
        self.equipment.weapon = Some(weapon);
        self
    }

    pub fn with_armor(mut self, name: &str, ac: i32) -> Self {
        self.equipment.armor = Some(Armor {
            name: name.to_string(),
            ac,
        });
        self
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn is_alive(&self) -> bool {
        self.stats.health > 0
    }

    pub fn faction(&self) -> Faction {
        self.alignment.faction()
    }

    /// Ability modifier for a stat
    pub fn ability_mod(&self, key: StatKey) -> i32 {
        self.stats.modifier(key)
    }

    /// Armor class: `10 + agility modifier + armor bonus`
    pub fn armor_class(&self) -> i32 {
        let armor_bonus = self.equipment.armor.as_ref().map_or(0, |a| a.ac);
        10 + self.ability_mod(StatKey::Agility) + armor_bonus
    }

    /// Whether health is below `threshold` of max health
    pub fn is_desperate(&self, threshold: f64) -> bool {
        (self.stats.health as f64) < self.stats.max_health as f64 * threshold
    }

    /// Apply damage, returning the amount actually applied
    pub fn take_damage(&mut self, amount: i32) -> i32 {
        let amount = amount.max(0);
        self.stats.health -= amount;
        amount
    }

    /// Heal (cannot exceed max health)
    pub fn heal(&mut self, amount: i32) -> i32 {
        let actual = amount.max(0).min(self.stats.max_health - self.stats.health).max(0);
        self.stats.health += actual;
        actual
    }
}

/// World genres
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Genre {
    Fantasy,
    SciFi,
    CyberNoir,
    Mythpunk,
    Horror,
    Comedy,
    RealisticSurvival,
    Steampunk,
    PostApocalyptic,
    CosmicWestern,
    Hybrid,
}

impl FromStr for Genre {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fantasy" => Ok(Genre::Fantasy),
            "sci-fi" | "scifi" => Ok(Genre::SciFi),
            "cyber-noir" => Ok(Genre::CyberNoir),
            "mythpunk" => Ok(Genre::Mythpunk),
            "horror" => Ok(Genre::Horror),
            "comedy" => Ok(Genre::Comedy),
            "realistic-survival" => Ok(Genre::RealisticSurvival),
            "steampunk" => Ok(Genre::Steampunk),
            "post-apocalyptic" => Ok(Genre::PostApocalyptic),
            "cosmic-western" => Ok(Genre::CosmicWestern),
            "hybrid" => Ok(Genre::Hybrid),
            _ => Err(()),
        }
    }
}

/// Read-only world context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct World {
    pub genre: Genre,
}

impl World {
    pub fn new(genre: Genre) -> Self {
        Self { genre }
    }
}
