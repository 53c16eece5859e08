//! The Session Service: the façade a transport calls per turn.
//!
//! It is the transaction boundary of a turn:
//!
//!   validate → lock session → append clinician turn → graph → append reply
//!
//! A turn is committed only once both turns are stored. If the graph fails
//! after the clinician turn was written, that turn stays in the ledger
//! without a reply and the caller gets an explicit error.
//!
//! Turns on one session are serialized with a per-session async lock; the
//! graph assumes a single writer per thread. The lock table holds weak
//! references, so an entry lives only while a turn holds or awaits it.
//! Completing a session drops its thread checkpoint.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, Weak},
};

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use clinisim_contracts::{
    error::{ClinisimError, ClinisimResult},
    profile::ProfileId,
    session::{
        CompletionOutcome, ConversationTurn, GradingMode, GradingSession, NewTurn, SessionId,
        SessionResult, SessionUpdate, ThreadId, UserId,
    },
};

use crate::{
    events::SessionEvent,
    graph::OrchestrationGraph,
    traits::{ConversationLedger, EventSink},
};

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub max_utterance_chars: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_utterance_chars: 4000,
        }
    }
}

/// Caller-facing answer to one chat turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TurnReply {
    Replied {
        #[serde(rename = "statusCode")]
        status_code: u16,
        message: String,
    },
    Failed {
        error: String,
    },
}

/// Both stored turns of a committed exchange.
#[derive(Debug, Clone)]
pub struct CommittedTurn {
    pub clinician: ConversationTurn,
    pub patient: ConversationTurn,
    pub total_score: f64,
}

pub struct SessionService {
    ledger: Arc<dyn ConversationLedger>,
    graph: Arc<OrchestrationGraph>,
    settings: SessionSettings,
    locks: Mutex<HashMap<SessionId, Weak<tokio::sync::Mutex<()>>>>,
}

impl SessionService {
    pub fn new(
        ledger: Arc<dyn ConversationLedger>,
        graph: Arc<OrchestrationGraph>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            ledger,
            graph,
            settings,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve or lazily create the session for `(user, profile)`.
    pub async fn open_session(
        &self,
        user: UserId,
        profile: ProfileId,
    ) -> ClinisimResult<GradingSession> {
        let session = self.ledger.find_or_create_session(user, profile).await?;
        info!(session_id = %session.id, user_id = %user, profile_id = %profile, "session opened");
        Ok(session)
    }

    /// Handle one chat turn and shape the result for the caller.
    pub async fn handle_turn(&self, session_id: SessionId, utterance: &str) -> TurnReply {
        match self.submit_turn(session_id, utterance).await {
            Ok(committed) => TurnReply::Replied {
                status_code: 200,
                message: committed.patient.content,
            },
            Err(e) => {
                warn!(session_id = %session_id, kind = e.kind(), error = %e, "turn failed");
                TurnReply::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Like `handle_turn`, also pushing `transcribed-text` and then
    /// `final-reply` or `error` to `sink`. A broken sink never fails the turn.
    pub async fn handle_turn_streaming(
        &self,
        session_id: SessionId,
        utterance: &str,
        sink: &dyn EventSink,
    ) -> TurnReply {
        emit(
            sink,
            SessionEvent::TranscribedText {
                session_id,
                text: utterance.to_string(),
            },
        )
        .await;

        let result = self.submit_turn(session_id, utterance).await;
        match result {
            Ok(committed) => {
                let message = committed.patient.content;
                emit(
                    sink,
                    SessionEvent::FinalReply {
                        session_id,
                        message: message.clone(),
                    },
                )
                .await;
                TurnReply::Replied {
                    status_code: 200,
                    message,
                }
            }
            Err(e) => {
                warn!(session_id = %session_id, kind = e.kind(), error = %e, "streamed turn failed");
                emit(sink, SessionEvent::from_error(session_id, &e)).await;
                TurnReply::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Run one turn, returning typed errors.
    pub async fn submit_turn(
        &self,
        session_id: SessionId,
        utterance: &str,
    ) -> ClinisimResult<CommittedTurn> {
        let utterance = self.validate_utterance(utterance)?;
        self.require_open_session(session_id).await?;

        let lock = self.lock_for(session_id)?;
        let _guard = lock.lock().await;

        // Completion may have won the lock while this turn waited.
        let session = self.require_open_session(session_id).await?;

        let clinician = self
            .ledger
            .append_turn(session_id, NewTurn::clinician(utterance))
            .await?;

        let thread = ThreadId::for_user(session.user_id, session.id);
        let outcome = match self.graph.run_turn(&thread, session.profile_id, utterance).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    turn_id = clinician.id.0,
                    kind = e.kind(),
                    "clinician turn left without a reply"
                );
                return Err(e);
            }
        };

        let mut metadata = json!({
            "thread_id": thread.to_string(),
            "checkpoint_version": outcome.version,
        });
        let mut reply = NewTurn::patient(&outcome.reply);
        let mut total_score = session.total_score;
        if let Some(score) = &outcome.score {
            metadata["critique"] = json!(score.critique);
            reply = reply.with_score(score.score);
            total_score += score.score;
        }
        let patient = self
            .ledger
            .append_turn(session_id, reply.with_metadata(metadata))
            .await?;

        if outcome.score.is_some() {
            self.ledger
                .update_session(
                    session_id,
                    SessionUpdate {
                        total_score: Some(total_score),
                        ..Default::default()
                    },
                )
                .await?;
        }

        info!(
            session_id = %session_id,
            thread_id = %thread,
            version = outcome.version,
            total_score,
            "turn committed"
        );
        Ok(CommittedTurn {
            clinician,
            patient,
            total_score,
        })
    }

    /// Grade the session and close it. One-way: a second call is rejected
    /// and leaves the stored score and remarks untouched.
    pub async fn complete(&self, session_id: SessionId) -> ClinisimResult<CompletionOutcome> {
        self.require_open_session(session_id).await?;

        let lock = self.lock_for(session_id)?;
        let _guard = lock.lock().await;

        let session = self.require_open_session(session_id).await?;

        let turns = self.ledger.list_turns(session_id).await?;
        let thread = ThreadId::for_user(session.user_id, session.id);
        let outcome = self
            .graph
            .run_completion(&thread, session.profile_id, &turns)
            .await?;

        let total_score = match self.graph.mode() {
            GradingMode::Holistic => outcome.grade.grade,
            GradingMode::Incremental => session.total_score,
        };
        let remarks = outcome.grade.remarks.clone();
        self.ledger
            .update_session(
                session_id,
                SessionUpdate {
                    total_score: Some(total_score),
                    agent_remarks: Some(remarks.clone()),
                    is_completed: Some(true),
                },
            )
            .await?;

        if let Err(e) = self.graph.checkpoints().delete(&thread).await {
            warn!(session_id = %session_id, thread_id = %thread, error = %e, "checkpoint left behind after completion");
        }

        info!(
            session_id = %session_id,
            grade = outcome.grade.grade,
            total_score,
            turns = turns.len(),
            "session completed"
        );
        Ok(CompletionOutcome {
            total_score,
            agent_remarks: remarks,
            grade: outcome.grade.grade,
            band: outcome.grade.band(),
        })
    }

    /// Stored turns in creation order.
    pub async fn transcript(&self, session_id: SessionId) -> ClinisimResult<Vec<ConversationTurn>> {
        self.require_session(session_id).await?;
        self.ledger.list_turns(session_id).await
    }

    pub async fn result(&self, session_id: SessionId) -> ClinisimResult<SessionResult> {
        let session = self.require_session(session_id).await?;
        Ok(SessionResult::from(&session))
    }

    /// All of a user's sessions, for results listings.
    pub async fn sessions_for_user(&self, user: UserId) -> ClinisimResult<Vec<SessionResult>> {
        let sessions = self.ledger.sessions_for_user(user).await?;
        Ok(sessions.iter().map(SessionResult::from).collect())
    }

    /// Drop the thread checkpoints of sessions removed from the ledger.
    pub async fn discard_threads(&self, sessions: &[GradingSession]) -> ClinisimResult<()> {
        for session in sessions {
            let thread = ThreadId::for_user(session.user_id, session.id);
            self.graph.checkpoints().delete(&thread).await?;
        }
        info!(sessions = sessions.len(), "thread checkpoints discarded");
        Ok(())
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    fn validate_utterance<'a>(&self, utterance: &'a str) -> ClinisimResult<&'a str> {
        let trimmed = utterance.trim();
        if trimmed.is_empty() {
            return Err(ClinisimError::validation("utterance must not be empty"));
        }
        let chars = trimmed.chars().count();
        if chars > self.settings.max_utterance_chars {
            return Err(ClinisimError::validation(format!(
                "utterance is {} characters, the limit is {}",
                chars, self.settings.max_utterance_chars
            )));
        }
        Ok(trimmed)
    }

    async fn require_session(&self, id: SessionId) -> ClinisimResult<GradingSession> {
        self.ledger
            .get_session(id)
            .await?
            .ok_or_else(|| ClinisimError::not_found("session", id))
    }

    /// Fails with `SessionCompleted` once the session is closed.
    async fn require_open_session(&self, id: SessionId) -> ClinisimResult<GradingSession> {
        let session = self.require_session(id).await?;
        if session.is_completed {
            warn!(session_id = %id, "request on a completed session");
            return Err(ClinisimError::SessionCompleted { session_id: id.0 });
        }
        Ok(session)
    }

    fn lock_table(&self) -> ClinisimResult<MutexGuard<'_, HashMap<SessionId, Weak<tokio::sync::Mutex<()>>>>> {
        self.locks.lock().map_err(|e| ClinisimError::StateMachine {
            reason: format!("session lock table poisoned: {}", e),
        })
    }

    fn lock_for(&self, id: SessionId) -> ClinisimResult<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self.lock_table()?;
        locks.retain(|_, lock| lock.strong_count() > 0);
        if let Some(lock) = locks.get(&id).and_then(Weak::upgrade) {
            return Ok(lock);
        }
        let lock = Arc::new(tokio::sync::Mutex::new(()));
        locks.insert(id, Arc::downgrade(&lock));
        Ok(lock)
    }
}

async fn emit(sink: &dyn EventSink, event: SessionEvent) {
    let name = event.name();
    if let Err(e) = sink.emit(event).await {
        warn!(event = name, error = %e, "push channel delivery failed");
    }
}
