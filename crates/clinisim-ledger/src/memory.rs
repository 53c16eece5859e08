//! In-memory profile store and conversation ledger.
//!
//! `InMemoryLedger` implements both `ProfileStore` and `ConversationLedger`
//! over one mutex-guarded state, so relational rules hold atomically:
//!
//! - at most one session per (user, profile) pair
//! - a session references an existing profile
//! - deleting a profile or a user cascades to its sessions and turns
//! - a completed session accepts no further turns or updates

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use clinisim_contracts::{
    error::{ClinisimError, ClinisimResult},
    profile::{PatientProfile, ProfileId},
    session::{
        ConversationTurn, GradingSession, NewTurn, SessionId, SessionUpdate, TurnId, UserId,
    },
};
use clinisim_core::traits::{ConversationLedger, ProfileStore};

use crate::{
    chain::{hash_turn, verify_chain},
    event::{ChainedTurn, TranscriptExport},
};

// ── Internal mutable state ───────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct LedgerState {
    pub(crate) profiles: BTreeMap<ProfileId, PatientProfile>,
    pub(crate) sessions: BTreeMap<SessionId, GradingSession>,
    pub(crate) pairs: HashMap<(UserId, ProfileId), SessionId>,
    pub(crate) chains: HashMap<SessionId, Vec<ChainedTurn>>,
    pub(crate) next_session: u64,
    pub(crate) next_turn: u64,
}

impl LedgerState {
    fn insert_session(&mut self, user: UserId, profile: ProfileId) -> ClinisimResult<GradingSession> {
        if !self.profiles.contains_key(&profile) {
            return Err(ClinisimError::not_found("patient profile", profile));
        }
        if self.pairs.contains_key(&(user, profile)) {
            return Err(ClinisimError::DuplicateSession {
                user_id: user.0,
                profile_id: profile.0,
            });
        }
        self.next_session += 1;
        let now = Utc::now();
        let session = GradingSession {
            id: SessionId(self.next_session),
            user_id: user,
            profile_id: profile,
            total_score: 0.0,
            is_completed: false,
            agent_remarks: None,
            created_at: now,
            updated_at: now,
        };
        self.pairs.insert((user, profile), session.id);
        self.sessions.insert(session.id, session.clone());
        self.chains.insert(session.id, Vec::new());
        Ok(session)
    }

    fn open_session_mut(&mut self, id: SessionId) -> ClinisimResult<&mut GradingSession> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or_else(|| ClinisimError::not_found("session", id))?;
        if session.is_completed {
            return Err(ClinisimError::SessionCompleted { session_id: id.0 });
        }
        Ok(session)
    }

    fn remove_sessions(&mut self, ids: &[SessionId]) -> Vec<GradingSession> {
        let mut removed = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(session) = self.sessions.remove(id) {
                self.pairs.remove(&(session.user_id, session.profile_id));
                removed.push(session);
            }
            self.chains.remove(id);
        }
        removed
    }
}

// ── Public ledger ────────────────────────────────────────────────────────────

/// Thread-safe, process-local ledger. Clones share state.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    pub(crate) state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> ClinisimResult<MutexGuard<'_, LedgerState>> {
        self.state.lock().map_err(|e| ClinisimError::StateMachine {
            reason: format!("ledger lock poisoned: {}", e),
        })
    }

    /// Create a session, failing with `DuplicateSession` if the pair exists.
    pub fn create_session(&self, user: UserId, profile: ProfileId) -> ClinisimResult<GradingSession> {
        let session = self.lock()?.insert_session(user, profile)?;
        info!(session_id = %session.id, user_id = %user, profile_id = %profile, "session created");
        Ok(session)
    }

    /// Delete a profile and every session and turn that references it.
    /// Returns the removed sessions.
    pub fn delete_profile(&self, id: ProfileId) -> ClinisimResult<Vec<GradingSession>> {
        let mut state = self.lock()?;
        if state.profiles.remove(&id).is_none() {
            return Err(ClinisimError::not_found("patient profile", id));
        }
        let doomed: Vec<SessionId> = state
            .sessions
            .values()
            .filter(|s| s.profile_id == id)
            .map(|s| s.id)
            .collect();
        let removed = state.remove_sessions(&doomed);
        info!(profile_id = %id, sessions = removed.len(), "profile deleted with its sessions");
        Ok(removed)
    }

    /// Delete every session and turn owned by `user`.
    pub fn delete_user(&self, user: UserId) -> ClinisimResult<Vec<GradingSession>> {
        let mut state = self.lock()?;
        let doomed: Vec<SessionId> = state
            .sessions
            .values()
            .filter(|s| s.user_id == user)
            .map(|s| s.id)
            .collect();
        let removed = state.remove_sessions(&doomed);
        info!(user_id = %user, sessions = removed.len(), "user sessions deleted");
        Ok(removed)
    }

    /// Check the session's transcript chain for tampering.
    pub fn verify_integrity(&self, session: SessionId) -> ClinisimResult<bool> {
        let state = self.lock()?;
        let chain = state
            .chains
            .get(&session)
            .ok_or_else(|| ClinisimError::not_found("session", session))?;
        Ok(verify_chain(chain))
    }

    pub fn export_transcript(&self, session: SessionId) -> ClinisimResult<TranscriptExport> {
        let state = self.lock()?;
        let entries = state
            .chains
            .get(&session)
            .ok_or_else(|| ClinisimError::not_found("session", session))?
            .clone();
        let terminal_hash = entries.last().map(|e| e.this_hash.clone()).unwrap_or_default();
        Ok(TranscriptExport {
            session_id: session,
            entries,
            exported_at: Utc::now(),
            terminal_hash,
        })
    }
}

// ── ProfileStore impl ────────────────────────────────────────────────────────

#[async_trait]
impl ProfileStore for InMemoryLedger {
    async fn find_by_id(&self, id: ProfileId) -> ClinisimResult<Option<PatientProfile>> {
        Ok(self.lock()?.profiles.get(&id).cloned())
    }

    async fn put(&self, id: ProfileId, profile: PatientProfile) -> ClinisimResult<()> {
        profile.validate()?;
        self.lock()?.profiles.insert(id, profile);
        debug!(profile_id = %id, "profile stored");
        Ok(())
    }
}

// ── ConversationLedger impl ──────────────────────────────────────────────────

#[async_trait]
impl ConversationLedger for InMemoryLedger {
    async fn find_or_create_session(
        &self,
        user: UserId,
        profile: ProfileId,
    ) -> ClinisimResult<GradingSession> {
        let mut state = self.lock()?;
        if let Some(id) = state.pairs.get(&(user, profile)) {
            if let Some(existing) = state.sessions.get(id) {
                return Ok(existing.clone());
            }
        }
        let session = state.insert_session(user, profile)?;
        info!(session_id = %session.id, user_id = %user, profile_id = %profile, "session created");
        Ok(session)
    }

    async fn get_session(&self, id: SessionId) -> ClinisimResult<Option<GradingSession>> {
        Ok(self.lock()?.sessions.get(&id).cloned())
    }

    async fn sessions_for_user(&self, user: UserId) -> ClinisimResult<Vec<GradingSession>> {
        Ok(self
            .lock()?
            .sessions
            .values()
            .filter(|s| s.user_id == user)
            .cloned()
            .collect())
    }

    /// Append one turn to the session's hash chain.
    async fn append_turn(
        &self,
        session: SessionId,
        turn: NewTurn,
    ) -> ClinisimResult<ConversationTurn> {
        let mut state = self.lock()?;
        state.open_session_mut(session)?.updated_at = Utc::now();

        state.next_turn += 1;
        let stored = ConversationTurn {
            id: TurnId(state.next_turn),
            session_id: session,
            agent: turn.agent,
            content: turn.content,
            score: turn.score,
            metadata: turn.metadata,
            created_at: Utc::now(),
        };

        let chain = state.chains.entry(session).or_default();
        let sequence = chain.len() as u64;
        let prev_hash = chain
            .last()
            .map(|e| e.this_hash.clone())
            .unwrap_or_else(|| ChainedTurn::GENESIS_HASH.to_string());
        let this_hash = hash_turn(session, sequence, &stored, &prev_hash);
        chain.push(ChainedTurn {
            sequence,
            turn: stored.clone(),
            prev_hash,
            this_hash,
        });

        debug!(session_id = %session, turn_id = stored.id.0, agent = stored.agent, sequence, "turn appended");
        Ok(stored)
    }

    async fn list_turns(&self, session: SessionId) -> ClinisimResult<Vec<ConversationTurn>> {
        let state = self.lock()?;
        let chain = state
            .chains
            .get(&session)
            .ok_or_else(|| ClinisimError::not_found("session", session))?;
        Ok(chain.iter().map(|e| e.turn.clone()).collect())
    }

    async fn update_session(
        &self,
        id: SessionId,
        update: SessionUpdate,
    ) -> ClinisimResult<GradingSession> {
        let mut state = self.lock()?;
        let session = state.open_session_mut(id)?;
        if let Some(score) = update.total_score {
            session.total_score = score;
        }
        if let Some(remarks) = update.agent_remarks {
            session.agent_remarks = Some(remarks);
        }
        if let Some(completed) = update.is_completed {
            session.is_completed = completed;
        }
        session.updated_at = Utc::now();
        Ok(session.clone())
    }
}
