//! Trait seams of the grading engine.
//!
//! - `ChatModel`          untrusted raw completion transport
//! - `ModelGateway`       enforces a declared output contract per call
//! - `Verifier`           trusted structural and semantic checker
//! - `ProfileStore`       patient profiles keyed by id
//! - `ConversationLedger` sessions and their ordered turns
//! - `CheckpointStore`    versioned per-thread graph state
//! - `EventSink`          push channel towards a connected client
//!
//! Everything that waits on I/O is async. The verifier is pure and stays sync.

use async_trait::async_trait;
use serde_json::Value;

use clinisim_contracts::{
    error::ClinisimResult,
    profile::{PatientProfile, ProfileId},
    session::{
        ConversationTurn, GradingSession, NewTurn, SessionId, SessionUpdate, ThreadId, UserId,
    },
    thread::ThreadState,
    verify::{OutputSchema, VerificationReport},
};

use crate::events::SessionEvent;

/// One request to a chat model.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Graph node issuing the call, for logs and timeout errors.
    pub node: String,
    pub system: String,
    pub user: String,
    pub temperature: f32,
}

/// A language model that turns a prompt into raw text.
///
/// Implementations are untrusted: nothing they return is used before the
/// gateway has checked it against an `OutputSchema`.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Return the model's raw completion text.
    ///
    /// Network and HTTP failures map to `ClinisimError::Transport` with
    /// `retryable` set for statuses worth repeating.
    async fn complete(&self, request: &ChatRequest) -> ClinisimResult<String>;
}

/// Structured model access: one call, one declared output shape.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Call the model and return JSON that has passed `shape`.
    ///
    /// Unparseable or non-conforming output is `SchemaViolation`, never a
    /// default value.
    async fn invoke(&self, request: &ChatRequest, shape: &OutputSchema) -> ClinisimResult<Value>;
}

/// The output verifier.
///
/// Implementations are trusted and must not call the model.
pub trait Verifier: Send + Sync {
    /// Return a report with `passed = true` if all rules pass, or the full
    /// set of failures otherwise.
    fn verify(&self, output: &Value, schema: &OutputSchema) -> ClinisimResult<VerificationReport>;
}

/// Patient profiles. Read-only during a conversation.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_by_id(&self, id: ProfileId) -> ClinisimResult<Option<PatientProfile>>;

    /// Insert or wholesale-replace a profile. Used by profile generation.
    async fn put(&self, id: ProfileId, profile: PatientProfile) -> ClinisimResult<()>;
}

/// Grading sessions and their append-only turns.
#[async_trait]
pub trait ConversationLedger: Send + Sync {
    /// Return the session for `(user, profile)`, creating it on first use.
    async fn find_or_create_session(
        &self,
        user: UserId,
        profile: ProfileId,
    ) -> ClinisimResult<GradingSession>;

    async fn get_session(&self, id: SessionId) -> ClinisimResult<Option<GradingSession>>;

    async fn sessions_for_user(&self, user: UserId) -> ClinisimResult<Vec<GradingSession>>;

    async fn append_turn(&self, session: SessionId, turn: NewTurn)
        -> ClinisimResult<ConversationTurn>;

    /// Turns in creation order.
    async fn list_turns(&self, session: SessionId) -> ClinisimResult<Vec<ConversationTurn>>;

    async fn update_session(
        &self,
        id: SessionId,
        update: SessionUpdate,
    ) -> ClinisimResult<GradingSession>;
}

/// Versioned per-thread state.
///
/// Stores do not lock: the session service guarantees a single writer per
/// thread. The version check turns a violation of that into an error instead
/// of a silent overwrite.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, thread: &ThreadId) -> ClinisimResult<Option<ThreadState>>;

    /// Persist `state` if the stored version still equals `state.version`
    /// (0 when nothing is stored). Returns the new version.
    async fn save(&self, state: &ThreadState) -> ClinisimResult<u64>;

    async fn delete(&self, thread: &ThreadId) -> ClinisimResult<()>;
}

/// A push channel to one connected client.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: SessionEvent) -> ClinisimResult<()>;
}
