//! Scripted combat scenarios
//!
//! A scenario is a roster, optional terrain and world, and an ordered list of
//! actions. Running one drives a session through the store and records every
//! outcome, including rejected actions.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::character::{Character, World};
use crate::combat::{
    Action, ActionOutcome, CombatError, DiceSource, Engine, FinishedCombat, SessionId,
    TerrainEffect,
};
use crate::store::SessionStore;

/// Errors loading a scenario file
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("failed to read scenario: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid scenario: {0}")]
    Json(#[from] serde_json::Error),
}

/// One scripted step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedAction {
    pub actor: String,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub characters: Vec<Character>,
    #[serde(default)]
    pub terrain: Vec<TerrainEffect>,
    #[serde(default)]
    pub world: Option<World>,
    /// Overrides the configured seed
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub actions: Vec<ScriptedAction>,
}

/// A step as it played out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub actor: String,
    pub action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ActionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub session: SessionId,
    /// Participant ids in initiative order
    pub initiative: Vec<String>,
    pub steps: Vec<StepReport>,
    /// Set when the script ran out before the combat ended
    pub abandoned: bool,
    pub finished: FinishedCombat,
}

impl Scenario {
    pub fn from_json(json: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Play the script; steps after the combat ends are not attempted
    pub fn run(
        self,
        engine: &Engine,
        store: &SessionStore,
        dice: &mut dyn DiceSource,
    ) -> Result<ScenarioReport, CombatError> {
        let id = store.start(engine, self.characters, self.terrain, self.world, dice)?;
        let initiative = store
            .get(id)
            .map(|s| s.participants.iter().map(|p| p.id().to_string()).collect())
            .unwrap_or_default();

        let mut steps = Vec::with_capacity(self.actions.len());
        let mut finished = None;

        for ScriptedAction { actor, action } in self.actions {
            match store.submit(engine, id, &actor, action.clone(), dice) {
                Ok(submission) => {
                    steps.push(StepReport {
                        actor,
                        action,
                        outcome: Some(submission.result),
                        error: None,
                    });
                    if submission.finished.is_some() {
                        finished = submission.finished;
                        break;
                    }
                }
                Err(e) => {
                    warn!("Scripted {:?} by {} rejected: {}", action, actor, e);
                    steps.push(StepReport {
                        actor,
                        action,
                        outcome: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let (abandoned, finished) = match finished {
            Some(finished) => (false, finished),
            None => (true, store.abandon(id)?),
        };

        Ok(ScenarioReport {
            session: id,
            initiative,
            steps,
            abandoned,
            finished,
        })
    }
}
