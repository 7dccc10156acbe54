//! mythrules - command line front end for the rules engine

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mythrules::character::{Character, Genre, World};
use mythrules::combat::{
    CheckKind, ConditionSet, DiceSource, RuleCheck, SeededDice, Skill, ThreadDice,
};
use mythrules::scenario::Scenario;
use mythrules::{Config, DiceFormula, Engine, SessionStore, StatKey};

/// Turn-based combat and ability-check rules engine
#[derive(Parser, Debug)]
#[command(name = "mythrules", version, about)]
struct Args {
    /// Configuration file (defaults to mythrules.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// RNG seed; overrides the configured seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Roll a dice formula such as 2d6+3
    Roll {
        formula: String,
        #[arg(long)]
        advantage: bool,
        #[arg(long)]
        disadvantage: bool,
    },
    /// Probability that a formula totals at least a target
    Odds {
        formula: String,
        target: i32,
        #[arg(long)]
        advantage: bool,
        #[arg(long)]
        disadvantage: bool,
    },
    /// Resolve a single check for a character
    Check {
        /// Character JSON file; an average human when omitted
        #[arg(long)]
        character: Option<PathBuf>,
        /// Stat to check (strength, agility, ...)
        #[arg(long, conflicts_with = "skill")]
        stat: Option<String>,
        /// Named skill (stealth, perception, ...)
        #[arg(long)]
        skill: Option<String>,
        /// Check kind when checking a stat: ability, save or attack
        #[arg(long, default_value = "ability")]
        kind: String,
        #[arg(long)]
        dc: i32,
        /// World genre (fantasy, horror, sci-fi, ...)
        #[arg(long)]
        genre: Option<String>,
    },
    /// Run a scripted combat scenario from a JSON file
    Simulate { scenario: PathBuf },
}

fn dice_source(seed: Option<u64>) -> Box<dyn DiceSource> {
    match seed {
        Some(seed) => Box::new(SeededDice::from_seed(seed)),
        None => Box::new(ThreadDice),
    }
}

fn formula_with(formula: &str, advantage: bool, disadvantage: bool) -> Result<DiceFormula> {
    Ok(formula
        .parse::<DiceFormula>()?
        .with_advantage(advantage)
        .with_disadvantage(disadvantage))
}

fn parse_kind(kind: &str) -> Result<CheckKind> {
    match kind.to_lowercase().as_str() {
        "ability" => Ok(CheckKind::Ability),
        "save" => Ok(CheckKind::Save),
        "attack" => Ok(CheckKind::Attack),
        "skill" => Ok(CheckKind::Skill),
        other => Err(anyhow!("Unknown check kind: {}", other)),
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log_filter.as_str().into());
    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let engine = Engine::new(config.rules.clone());
    let seed = args.seed.or(config.seed);

    match args.command {
        Command::Roll {
            formula,
            advantage,
            disadvantage,
        } => {
            let formula = formula_with(&formula, advantage, disadvantage)?;
            let outcome = formula.roll_detailed(dice_source(seed).as_mut());
            print_json(&json!({ "formula": formula.to_string(), "roll": outcome }))?;
        }
        Command::Odds {
            formula,
            target,
            advantage,
            disadvantage,
        } => {
            let formula = formula_with(&formula, advantage, disadvantage)?;
            print_json(&json!({
                "formula": formula.to_string(),
                "target": target,
                "probability": formula.probability_at_least(target),
                "min": formula.min(),
                "max": formula.max(),
                "average": formula.average(),
            }))?;
        }
        Command::Check {
            character,
            stat,
            skill,
            kind,
            dc,
            genre,
        } => {
            let character: Character = match character {
                Some(path) => {
                    let json = std::fs::read_to_string(&path)
                        .map_err(|e| anyhow!("Failed to read {}: {}", path.display(), e))?;
                    serde_json::from_str(&json)?
                }
                None => Character::new("adventurer", "Adventurer"),
            };
            let world = genre
                .map(|g| {
                    g.parse::<Genre>()
                        .map(World::new)
                        .map_err(|_| anyhow!("Unknown genre: {}", g))
                })
                .transpose()?;

            let check = match (skill, stat) {
                (Some(skill), _) => skill
                    .parse::<Skill>()
                    .map_err(|_| anyhow!("Unknown skill: {}", skill))?
                    .check(dc),
                (None, Some(stat)) => {
                    let stat = stat
                        .parse::<StatKey>()
                        .map_err(|_| anyhow!("Unknown stat: {}", stat))?;
                    RuleCheck::new(parse_kind(&kind)?, stat, dc)
                }
                (None, None) => return Err(anyhow!("Either --stat or --skill is required")),
            };

            let result = engine.perform_check(
                &character,
                &ConditionSet::new(),
                &check,
                world.as_ref(),
                dice_source(seed).as_mut(),
            );
            print_json(&result)?;
        }
        Command::Simulate { scenario } => {
            let scenario = Scenario::load(&scenario)?;
            let mut dice = dice_source(scenario.seed.or(seed));
            let store = SessionStore::new();

            let report = scenario.run(&engine, &store, dice.as_mut())?;
            info!(
                "Scenario finished after {} steps (abandoned: {})",
                report.steps.len(),
                report.abandoned
            );
            print_json(&report)?;
        }
    }

    Ok(())
}
