//! Grading sessions, conversation turns, and structured feedback.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::profile::ProfileId;

// ── Identifiers ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TurnId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key scoping checkpointed conversational state: (subject, session).
///
/// Rendered as `"<subject>-<session>"`, which is the storage key used by
/// checkpoint stores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ThreadId {
    pub subject: String,
    pub session: SessionId,
}

impl ThreadId {
    pub fn new(subject: impl Into<String>, session: SessionId) -> Self {
        Self {
            subject: subject.into(),
            session,
        }
    }

    pub fn for_user(user: UserId, session: SessionId) -> Self {
        Self::new(user.to_string(), session)
    }
}

impl std::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.subject, self.session)
    }
}

// ── Grading mode & bands ─────────────────────────────────────────────────────

/// How `totalScore` evolves over a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradingMode {
    /// Every turn is scored in [-100, 100] and added to the running total.
    Incremental,
    /// One 0-100 grade over the full transcript at completion.
    #[default]
    Holistic,
}

impl std::str::FromStr for GradingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "incremental" => Ok(GradingMode::Incremental),
            "holistic" => Ok(GradingMode::Holistic),
            other => Err(format!("unknown grading mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeBand {
    Excellent,
    GoodWithGaps,
    SignificantDeficiency,
    Unsafe,
}

impl GradeBand {
    pub fn from_grade(grade: f64) -> Self {
        if grade >= 90.0 {
            GradeBand::Excellent
        } else if grade >= 75.0 {
            GradeBand::GoodWithGaps
        } else if grade >= 60.0 {
            GradeBand::SignificantDeficiency
        } else {
            GradeBand::Unsafe
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GradeBand::Excellent => "excellent",
            GradeBand::GoodWithGaps => "good with gaps",
            GradeBand::SignificantDeficiency => "significant deficiency",
            GradeBand::Unsafe => "unsafe / major omission",
        }
    }
}

// ── Structured feedback ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewFeedback {
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub missed_questions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectedDiagnosis {
    pub student_diagnosis: String,
    pub correct_diagnosis: String,
    pub rationale: String,
    pub diagnostic_criteria_missed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentFeedback {
    pub student_treatment: String,
    pub issues: Vec<String>,
    pub recommended_alternatives: Vec<String>,
    pub evidence_based_rationale: String,
}

/// Feedback stored on a session at completion.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRemarks {
    pub interview_feedback: InterviewFeedback,
    pub corrected_diagnosis: CorrectedDiagnosis,
    pub treatment_feedback: TreatmentFeedback,
    pub note_improvement_guidance: String,
}

// ── Sessions & turns ─────────────────────────────────────────────────────────

/// One trainee's attempt against one profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingSession {
    pub id: SessionId,
    pub user_id: UserId,
    pub profile_id: ProfileId,
    pub total_score: f64,
    pub is_completed: bool,
    pub agent_remarks: Option<AgentRemarks>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update applied by `ConversationLedger::update_session`.
/// `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionUpdate {
    pub total_score: Option<f64>,
    pub agent_remarks: Option<AgentRemarks>,
    pub is_completed: Option<bool>,
}

/// One stored utterance. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: TurnId,
    pub session_id: SessionId,
    /// false = clinician, true = simulated patient.
    pub agent: bool,
    pub content: String,
    pub score: Option<f64>,
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
}

/// A turn not yet stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTurn {
    pub agent: bool,
    pub content: String,
    pub score: Option<f64>,
    pub metadata: Option<Value>,
}

impl NewTurn {
    pub fn clinician(content: impl Into<String>) -> Self {
        Self {
            agent: false,
            content: content.into(),
            score: None,
            metadata: None,
        }
    }

    pub fn patient(content: impl Into<String>) -> Self {
        Self {
            agent: true,
            content: content.into(),
            score: None,
            metadata: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// What the completion endpoint returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionOutcome {
    pub total_score: f64,
    pub agent_remarks: AgentRemarks,
    /// The holistic grade, reported even when the stored total is the
    /// incremental accumulation.
    pub grade: f64,
    pub band: GradeBand,
}

/// Read view of a session's score state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    pub session_id: SessionId,
    pub total_score: f64,
    pub is_completed: bool,
    pub agent_remarks: Option<AgentRemarks>,
}

impl From<&GradingSession> for SessionResult {
    fn from(s: &GradingSession) -> Self {
        Self {
            session_id: s.id,
            total_score: s.total_score,
            is_completed: s.is_completed,
            agent_remarks: s.agent_remarks.clone(),
        }
    }
}
