//! Session store
//!
//! Owns active combat sessions keyed by id. Each session sits behind its own
//! mutex; a submission against a session that is already processing an
//! action is rejected with [`CombatError::SessionBusy`] rather than queued.
//! Ended and abandoned sessions are removed from the store.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::character::{Character, World};
use crate::combat::{
    Action, ActionOutcome, CombatError, CombatSession, DiceSource, Engine, FinishedCombat,
    SessionId, TerrainEffect, TurnReport,
};

/// Result of a submission through the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission<T> {
    pub result: T,
    /// Present when the session ended and was removed
    pub finished: Option<FinishedCombat>,
}

/// Externally owned map of active sessions
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<CombatSession>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initiate a combat and store it
    pub fn start(
        &self,
        engine: &Engine,
        characters: Vec<Character>,
        terrain: Vec<TerrainEffect>,
        world: Option<World>,
        dice: &mut dyn DiceSource,
    ) -> Result<SessionId, CombatError> {
        let session = engine.initiate_combat(characters, terrain, world, dice)?;
        Ok(self.insert(session))
    }

    /// Store an existing session
    pub fn insert(&self, session: CombatSession) -> SessionId {
        let id = session.id;
        self.sessions.write().insert(id, Arc::new(Mutex::new(session)));
        id
    }

    /// Snapshot of a session
    pub fn get(&self, id: SessionId) -> Option<CombatSession> {
        let handle = self.handle(id).ok()?;
        let session = handle.lock();
        Some(session.clone())
    }

    /// Ids of all active sessions
    pub fn list(&self) -> Vec<SessionId> {
        self.sessions.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Process an action against a stored session
    pub fn submit(
        &self,
        engine: &Engine,
        id: SessionId,
        actor_id: &str,
        action: Action,
        dice: &mut dyn DiceSource,
    ) -> Result<Submission<ActionOutcome>, CombatError> {
        self.with_session(id, |session| engine.process_action(session, actor_id, action, dice))
    }

    /// End the active participant's turn in a stored session
    pub fn end_turn(
        &self,
        engine: &Engine,
        id: SessionId,
        dice: &mut dyn DiceSource,
    ) -> Result<Submission<TurnReport>, CombatError> {
        self.with_session(id, |session| engine.end_turn(session, dice))
    }

    /// Discard a session without rewards, returning its characters
    ///
    /// A session that is processing an action is left in place and
    /// [`CombatError::SessionBusy`] is returned.
    pub fn abandon(&self, id: SessionId) -> Result<FinishedCombat, CombatError> {
        let mut sessions = self.sessions.write();
        let handle = sessions
            .get(&id)
            .cloned()
            .ok_or_else(|| CombatError::SessionNotFound(id.to_string()))?;
        // Never blocks while the map lock is held
        let mut session = handle
            .try_lock()
            .ok_or_else(|| CombatError::SessionBusy(id.to_string()))?;
        sessions.remove(&id);
        drop(sessions);

        info!("Combat {} abandoned", id);
        Ok(session.finish())
    }

    fn handle(&self, id: SessionId) -> Result<Arc<Mutex<CombatSession>>, CombatError> {
        self.sessions
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| CombatError::SessionNotFound(id.to_string()))
    }

    /// Run `op` with exclusive access to a session, removing it if it ends
    fn with_session<T>(
        &self,
        id: SessionId,
        op: impl FnOnce(&mut CombatSession) -> Result<T, CombatError>,
    ) -> Result<Submission<T>, CombatError> {
        // The map lock is released before the session lock is taken
        let handle = self.handle(id)?;
        let mut session = handle
            .try_lock()
            .ok_or_else(|| CombatError::SessionBusy(id.to_string()))?;

        let result = op(&mut *session)?;

        let finished = if session.is_active() {
            None
        } else {
            self.sessions.write().remove(&id);
            Some(session.finish())
        };

        Ok(Submission { result, finished })
    }
}
