//! Error types for the clinisim grading engine.
//!
//! All fallible operations return `ClinisimResult<T>`. Variants are split so
//! callers can tell a transient model failure (retry) from a broken output
//! contract (fail the turn) from a caller mistake (reject before any model call).

use thiserror::Error;

/// The unified error type for the grading engine.
#[derive(Debug, Error)]
pub enum ClinisimError {
    /// A session, profile, or turn does not exist.
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// The model endpoint or network failed.
    ///
    /// `retryable` is false for failures a retry cannot fix (bad credentials,
    /// unknown model).
    #[error("model transport failed: {reason}")]
    Transport { reason: String, retryable: bool },

    /// A single model call exceeded the configured per-call timeout.
    #[error("node '{node}' timed out after {after_ms}ms")]
    Timeout { node: String, after_ms: u64 },

    /// The model's output did not match the declared output contract.
    #[error("output contract '{contract}' violated: {reason}")]
    SchemaViolation { contract: String, reason: String },

    /// Synthesized content failed the content-safety screen.
    #[error("safety violation: {reason}")]
    SafetyViolation { reason: String },

    /// Malformed caller input, rejected before any model call.
    #[error("validation error: {reason}")]
    Validation { reason: String },

    /// The session is completed and read-only.
    #[error("grading session {session_id} is already completed")]
    SessionCompleted { session_id: u64 },

    /// A second session for the same (user, profile) pair was requested.
    #[error("user {user_id} already has a grading session for profile {profile_id}")]
    DuplicateSession { user_id: u64, profile_id: u64 },

    /// The orchestration graph reached a state it must never reach.
    #[error("state machine error: {reason}")]
    StateMachine { reason: String },

    /// Thread state could not be loaded or saved.
    #[error("checkpoint error: {reason}")]
    Checkpoint { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },
}

impl ClinisimError {
    /// True when the same call may succeed if repeated.
    ///
    /// Schema and safety violations are never retryable: repeating the call
    /// would only paper over a prompt or contract defect.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClinisimError::Transport { retryable, .. } => *retryable,
            ClinisimError::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Stable machine-readable name used in caller-facing error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            ClinisimError::NotFound { .. } => "not_found",
            ClinisimError::Transport { .. } => "transport",
            ClinisimError::Timeout { .. } => "timeout",
            ClinisimError::SchemaViolation { .. } => "schema_violation",
            ClinisimError::SafetyViolation { .. } => "safety_violation",
            ClinisimError::Validation { .. } => "validation",
            ClinisimError::SessionCompleted { .. } => "session_completed",
            ClinisimError::DuplicateSession { .. } => "duplicate_session",
            ClinisimError::StateMachine { .. } => "state_machine",
            ClinisimError::Checkpoint { .. } => "checkpoint",
            ClinisimError::Config { .. } => "config",
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        ClinisimError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        ClinisimError::Validation {
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the clinisim crates.
pub type ClinisimResult<T> = Result<T, ClinisimError>;
