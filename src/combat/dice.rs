//! Dice rolling system
//!
//! Parses and rolls dice notation like "2d6+3", "1d20", "4d6-2".
//! All randomness flows through a [`DiceSource`] so rolls are reproducible
//! under a fixed seed or a scripted sequence of faces.

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::LazyLock;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Die sizes the engine accepts
pub const SUPPORTED_SIDES: [u32; 7] = [4, 6, 8, 10, 12, 20, 100];

/// Largest pool a formula may roll
pub const MAX_DICE: u32 = 100;

/// Largest flat modifier, either sign
pub const MAX_MODIFIER: i32 = 1000;

static DICE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d*)d(\d+)([+-]\d+)?$").unwrap());

/// Errors from parsing or validating a dice formula
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("invalid dice notation: {0}")]
    InvalidNotation(String),

    #[error("dice count must be at least 1")]
    ZeroDice,

    #[error("unsupported die: d{0}")]
    UnsupportedSides(u32),

    #[error("too many dice: {0} (at most {max})", max = MAX_DICE)]
    TooManyDice(u32),

    #[error("modifier out of range: {0} (at most {max} either way)", max = MAX_MODIFIER)]
    ModifierOutOfRange(i32),
}

/// Source of die faces
pub trait DiceSource {
    /// Roll one die, returning a face in `1..=sides`
    fn roll_die(&mut self, sides: u32) -> u32;
}

/// Seed-reproducible dice backed by `StdRng`
#[derive(Debug, Clone)]
pub struct SeededDice {
    rng: StdRng,
}

impl SeededDice {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl DiceSource for SeededDice {
    fn roll_die(&mut self, sides: u32) -> u32 {
        self.rng.random_range(1..=sides.max(1))
    }
}

/// Dice drawn from the thread-local generator
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadDice;

impl DiceSource for ThreadDice {
    fn roll_die(&mut self, sides: u32) -> u32 {
        rand::rng().random_range(1..=sides.max(1))
    }
}

/// Dice that return a scripted sequence of faces
///
/// Once the script is exhausted the last face repeats. Faces are clamped
/// to the die being rolled.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDice {
    faces: VecDeque<u32>,
    last: u32,
}

impl ScriptedDice {
    pub fn new(faces: impl IntoIterator<Item = u32>) -> Self {
        Self {
            faces: faces.into_iter().collect(),
            last: 1,
        }
    }

    /// Always roll the same face
    pub fn repeat(face: u32) -> Self {
        Self {
            faces: VecDeque::new(),
            last: face,
        }
    }

    /// Faces not yet consumed
    pub fn remaining(&self) -> usize {
        self.faces.len()
    }
}

impl DiceSource for ScriptedDice {
    fn roll_die(&mut self, sides: u32) -> u32 {
        if let Some(face) = self.faces.pop_front() {
            self.last = face;
        }
        self.last.clamp(1, sides.max(1))
    }
}

fn default_critical_range() -> u32 {
    20
}

fn default_fumble_range() -> u32 {
    1
}

/// A dice formula: `dice`d`sides` + `modifier`, optionally with (dis)advantage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FormulaRepr", rename_all = "camelCase")]
pub struct DiceFormula {
    pub dice: u32,
    pub sides: u32,
    pub modifier: i32,
    pub advantage: bool,
    pub disadvantage: bool,
    /// Natural face at or above this is a critical (single d20 only)
    pub critical_range: u32,
    /// Natural face at or below this is a fumble (single d20 only)
    pub fumble_range: u32,
}

/// Accepts either `"2d6+3"` or the full object form
#[derive(Deserialize)]
#[serde(untagged)]
enum FormulaRepr {
    Notation(String),
    #[serde(rename_all = "camelCase")]
    Full {
        dice: u32,
        sides: u32,
        #[serde(default)]
        modifier: i32,
        #[serde(default)]
        advantage: bool,
        #[serde(default)]
        disadvantage: bool,
        #[serde(default = "default_critical_range")]
        critical_range: u32,
        #[serde(default = "default_fumble_range")]
        fumble_range: u32,
    },
}

impl TryFrom<FormulaRepr> for DiceFormula {
    type Error = DiceError;

    fn try_from(repr: FormulaRepr) -> Result<Self, Self::Error> {
        match repr {
            FormulaRepr::Notation(s) => parse_dice(&s),
            FormulaRepr::Full {
                dice,
                sides,
                modifier,
                advantage,
                disadvantage,
                critical_range,
                fumble_range,
            } => {
                let formula = DiceFormula {
                    dice,
                    sides,
                    modifier,
                    advantage,
                    disadvantage,
                    critical_range,
                    fumble_range,
                };
                formula.validate()?;
                Ok(formula)
            }
        }
    }
}

/// Result of rolling a formula
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollOutcome {
    /// Kept pool sum plus modifier
    pub total: i32,
    /// Faces of the kept pool
    pub kept: Vec<u32>,
    /// Faces of the discarded pool under advantage/disadvantage
    pub discarded: Vec<u32>,
    /// Raw face of a single d20 roll
    pub natural: Option<u32>,
    pub critical: bool,
    pub fumble: bool,
}

impl DiceFormula {
    /// Create a plain formula with default critical/fumble ranges
    pub fn new(dice: u32, sides: u32, modifier: i32) -> Self {
        Self {
            dice,
            sides,
            modifier,
            advantage: false,
            disadvantage: false,
            critical_range: default_critical_range(),
            fumble_range: default_fumble_range(),
        }
    }

    /// A single d20 plus modifier
    pub fn d20(modifier: i32) -> Self {
        Self::new(1, 20, modifier)
    }

    pub fn with_advantage(mut self, advantage: bool) -> Self {
        self.advantage = advantage;
        self
    }

    pub fn with_disadvantage(mut self, disadvantage: bool) -> Self {
        self.disadvantage = disadvantage;
        self
    }

    pub fn with_modifier(mut self, modifier: i32) -> Self {
        self.modifier = modifier;
        self
    }

    pub fn validate(&self) -> Result<(), DiceError> {
        if self.dice == 0 {
            return Err(DiceError::ZeroDice);
        }
        if self.dice > MAX_DICE {
            return Err(DiceError::TooManyDice(self.dice));
        }
        if !SUPPORTED_SIDES.contains(&self.sides) {
            return Err(DiceError::UnsupportedSides(self.sides));
        }
        if self.modifier.unsigned_abs() > MAX_MODIFIER.unsigned_abs() {
            return Err(DiceError::ModifierOutOfRange(self.modifier));
        }
        Ok(())
    }

    /// Whether two pools are drawn; advantage and disadvantage cancel out
    fn pool_mode(&self) -> PoolMode {
        match (self.advantage, self.disadvantage) {
            (true, false) => PoolMode::KeepHigher,
            (false, true) => PoolMode::KeepLower,
            _ => PoolMode::Single,
        }
    }

    /// Whether critical/fumble detection applies
    pub fn detects_extremes(&self) -> bool {
        self.dice == 1 && self.sides == 20
    }

    /// Roll the formula and return the total
    pub fn roll(&self, rng: &mut dyn DiceSource) -> i32 {
        self.roll_detailed(rng).total
    }

    /// Roll and return the kept faces, total and natural extremes
    pub fn roll_detailed(&self, rng: &mut dyn DiceSource) -> RollOutcome {
        let first = self.draw_pool(rng);

        let (kept, discarded) = match self.pool_mode() {
            PoolMode::Single => (first, Vec::new()),
            mode => {
                let second = self.draw_pool(rng);
                let first_sum: u32 = first.iter().sum();
                let second_sum: u32 = second.iter().sum();
                let take_second = match mode {
                    PoolMode::KeepHigher => second_sum > first_sum,
                    _ => second_sum < first_sum,
                };
                if take_second {
                    (second, first)
                } else {
                    (first, second)
                }
            }
        };

        let sum: u32 = kept.iter().sum();
        let total = clamp_total(sum as i64 + self.modifier as i64);

        let natural = if self.detects_extremes() {
            kept.first().copied()
        } else {
            None
        };
        let critical = natural.is_some_and(|n| n >= self.critical_range);
        let fumble = natural.is_some_and(|n| n <= self.fumble_range);

        if critical {
            debug!("critical success on {} (natural {:?})", self, natural);
        } else if fumble {
            debug!("critical failure on {} (natural {:?})", self, natural);
        }

        RollOutcome {
            total,
            kept,
            discarded,
            natural,
            critical,
            fumble,
        }
    }

    fn draw_pool(&self, rng: &mut dyn DiceSource) -> Vec<u32> {
        (0..self.dice).map(|_| rng.roll_die(self.sides)).collect()
    }

    /// Get the minimum possible result
    pub fn min(&self) -> i32 {
        clamp_total(self.dice as i64 + self.modifier as i64)
    }

    /// Get the maximum possible result
    pub fn max(&self) -> i32 {
        clamp_total(self.dice as i64 * self.sides as i64 + self.modifier as i64)
    }

    /// Get the expected average of a single pool (rounded down)
    pub fn average(&self) -> i32 {
        let avg_per_die = (1.0 + self.sides as f64) / 2.0;
        (self.dice as f64 * avg_per_die + self.modifier as f64).floor() as i32
    }

    /// Exact probability that a roll totals at least `target`
    pub fn probability_at_least(&self, target: i32) -> f64 {
        if target <= self.min() {
            return 1.0;
        }
        if target > self.max() {
            return 0.0;
        }

        let dist = self.pool_distribution();
        // dist[s] = P(pool sum == s)
        let needed = (target - self.modifier) as usize;
        let below: f64 = dist.iter().take(needed).sum();
        let single = 1.0 - below;

        match self.pool_mode() {
            PoolMode::Single => single,
            PoolMode::KeepHigher => 1.0 - below * below,
            PoolMode::KeepLower => single * single,
        }
    }

    fn pool_distribution(&self) -> Vec<f64> {
        let sides = self.sides as usize;
        let max_sum = self.dice as usize * sides;
        let face_p = 1.0 / sides as f64;

        let mut dist = vec![0.0; max_sum + 1];
        dist[0] = 1.0;
        for _ in 0..self.dice {
            let mut next = vec![0.0; max_sum + 1];
            for (sum, p) in dist.iter().enumerate() {
                if *p == 0.0 {
                    continue;
                }
                for face in 1..=sides {
                    if sum + face <= max_sum {
                        next[sum + face] += p * face_p;
                    }
                }
            }
            dist = next;
        }
        dist
    }
}

fn clamp_total(total: i64) -> i32 {
    total.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PoolMode {
    Single,
    KeepHigher,
    KeepLower,
}

impl FromStr for DiceFormula {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_dice(s)
    }
}

impl std::fmt::Display for DiceFormula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.modifier > 0 {
            write!(f, "{}d{}+{}", self.dice, self.sides, self.modifier)
        } else if self.modifier < 0 {
            write!(f, "{}d{}{}", self.dice, self.sides, self.modifier)
        } else {
            write!(f, "{}d{}", self.dice, self.sides)
        }
    }
}

/// Parse a dice notation string like "2d6+3"
pub fn parse_dice(notation: &str) -> Result<DiceFormula, DiceError> {
    let cleaned: String = notation
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    let caps = DICE_REGEX
        .captures(&cleaned)
        .ok_or_else(|| DiceError::InvalidNotation(notation.trim().to_string()))?;

    // "d6" means "1d6"
    let dice: u32 = match &caps[1] {
        "" => 1,
        count => count
            .parse()
            .map_err(|_| DiceError::InvalidNotation(notation.trim().to_string()))?,
    };
    let sides: u32 = caps[2]
        .parse()
        .map_err(|_| DiceError::InvalidNotation(notation.trim().to_string()))?;
    let modifier: i32 = match caps.get(3) {
        Some(m) => m
            .as_str()
            .parse()
            .map_err(|_| DiceError::InvalidNotation(notation.trim().to_string()))?,
        None => 0,
    };

    let formula = DiceFormula::new(dice, sides, modifier);
    formula.validate()?;
    Ok(formula)
}
