//! Test doubles shared by the unit tests in this crate.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use clinisim_contracts::{
    error::{ClinisimError, ClinisimResult},
    profile::{PatientProfile, ProfileId},
    session::{
        ConversationTurn, GradingSession, NewTurn, SessionId, SessionUpdate, ThreadId, TurnId,
        UserId,
    },
    thread::ThreadState,
    verify::OutputSchema,
};

use crate::{
    checkpoint::InMemoryCheckpointStore,
    traits::{ChatRequest, CheckpointStore, ConversationLedger, ModelGateway, ProfileStore},
};

pub fn profile_value() -> Value {
    json!({
        "schema_version": "1.0",
        "case_metadata": {
            "case_id": "case-mdd-42",
            "difficulty": "moderate",
            "setting": "outpatient",
            "chief_complaint": "I can't sleep and nothing feels worth doing"
        },
        "primary_diagnosis": {
            "dx_id": 7,
            "name": "Major depressive disorder",
            "code": "F32.1",
            "confidence": "high",
            "rationale": "Low mood, anhedonia and insomnia for six weeks"
        },
        "symptoms": [
            {
                "symptom_id": "insomnia",
                "symptom_name": "Insomnia",
                "present": true,
                "severity": 2,
                "disclosure_rules": {
                    "spontaneous": true, "requires_open": false, "requires_direct": false,
                    "requires_normalization": false, "requires_empathy_first": false
                }
            },
            {
                "symptom_id": "anhedonia",
                "symptom_name": "Anhedonia",
                "present": true,
                "severity": 3,
                "disclosure_rules": {
                    "spontaneous": false, "requires_open": true, "requires_direct": false,
                    "requires_normalization": false, "requires_empathy_first": true
                }
            }
        ],
        "risk_assessment": {
            "suicide_risk": {
                "passive_death_wish": true, "active_ideation": false,
                "plan": false, "intent": false,
                "protective_factors": ["daughter"]
            },
            "homicide_risk": false
        },
        "mental_status": {
            "speech": "slow", "mood": "down", "affect": "constricted",
            "thought_process": "linear", "thought_content": "hopelessness",
            "perception": "normal", "cognition": "intact",
            "insight": "partial", "judgment": "fair"
        },
        "interaction_style": {
            "verbosity": "low", "affect_style": "flat", "trust_baseline": "guarded",
            "defensiveness_triggers": ["being rushed"],
            "engagement_improves_with": ["validation"]
        },
        "treatment_options": {
            "recommended": [{
                "treatment_id": "ssri", "treatment_name": "Sertraline",
                "rationale": "first-line pharmacotherapy"
            }]
        },
        "red_flag_triggers": [{
            "trigger": "mentions being better off dead",
            "expected_follow_up": "ask directly about suicidal ideation"
        }],
        "scoring_blueprint": {
            "must_elicit": ["sleep", "mood", "suicidal ideation"],
            "must_rule_out": ["bipolar disorder"],
            "communication_goals": ["open questions", "empathy"]
        }
    })
}

pub fn profile() -> PatientProfile {
    serde_json::from_value(profile_value()).unwrap()
}

pub fn grade_value(grade: f64) -> Value {
    json!({
        "grade": grade,
        "interviewFeedback": {
            "strengths": ["open questions"],
            "areasForImprovement": ["screen risk earlier"],
            "missedQuestions": ["appetite"]
        },
        "correctedDiagnosis": {
            "studentDiagnosis": "insomnia disorder",
            "correctDiagnosis": "Major depressive disorder",
            "rationale": "anhedonia and low mood over six weeks",
            "diagnosticCriteriaMissed": ["anhedonia"]
        },
        "treatmentFeedback": {
            "studentTreatment": "sleep hygiene",
            "issues": ["no antidepressant considered"],
            "recommendedAlternatives": ["Sertraline"],
            "evidenceBasedRationale": "SSRIs are first line"
        },
        "noteImprovementGuidance": "Document the risk assessment explicitly."
    })
}

// ── Profile store ────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FixedProfiles {
    profiles: Mutex<HashMap<ProfileId, PatientProfile>>,
}

impl FixedProfiles {
    pub fn with(id: ProfileId, profile: PatientProfile) -> Self {
        let store = Self::default();
        store.profiles.lock().unwrap().insert(id, profile);
        store
    }
}

#[async_trait]
impl ProfileStore for FixedProfiles {
    async fn find_by_id(&self, id: ProfileId) -> ClinisimResult<Option<PatientProfile>> {
        Ok(self.profiles.lock().unwrap().get(&id).cloned())
    }

    async fn put(&self, id: ProfileId, profile: PatientProfile) -> ClinisimResult<()> {
        self.profiles.lock().unwrap().insert(id, profile);
        Ok(())
    }
}

// ── Gateway ──────────────────────────────────────────────────────────────────

/// Answers by node name and logs every call.
pub struct NodeGateway {
    calls: Arc<Mutex<Vec<String>>>,
    delays: Vec<(String, Duration)>,
    failing: Vec<String>,
    reply: String,
    overrides: HashMap<String, Value>,
}

impl NodeGateway {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            delays: Vec::new(),
            failing: Vec::new(),
            reply: "I haven't been sleeping much. Maybe four hours a night.".to_string(),
            overrides: HashMap::new(),
        }
    }

    /// Sleep before answering any node whose name starts with `prefix`.
    pub fn with_delay(mut self, prefix: &str, delay: Duration) -> Self {
        self.delays.push((prefix.to_string(), delay));
        self
    }

    pub fn failing(mut self, node: &str) -> Self {
        self.failing.push(node.to_string());
        self
    }

    pub fn reply_with(mut self, reply: &str) -> Self {
        self.reply = reply.to_string();
        self
    }

    pub fn answer(mut self, node: &str, value: Value) -> Self {
        self.overrides.insert(node.to_string(), value);
        self
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        self.calls.clone()
    }
}

#[async_trait]
impl ModelGateway for NodeGateway {
    async fn invoke(&self, request: &ChatRequest, _shape: &OutputSchema) -> ClinisimResult<Value> {
        let node = request.node.as_str();
        if let Some((_, delay)) = self.delays.iter().find(|(p, _)| node.starts_with(p.as_str())) {
            tokio::time::sleep(*delay).await;
        }
        self.calls.lock().unwrap().push(node.to_string());
        if self.failing.iter().any(|f| f == node) {
            return Err(ClinisimError::Transport {
                reason: format!("{} unavailable", node),
                retryable: false,
            });
        }
        if let Some(value) = self.overrides.get(node) {
            return Ok(value.clone());
        }
        Ok(match node {
            "GenerateResponse" => json!({ "patient_response": self.reply }),
            "ScoreTurn" => json!({ "score": 15, "critique": "Open question, good rapport." }),
            "Grade" => grade_value(78.0),
            "ChiefComplaint" => json!({ "chief_complaint": "I just feel empty all the time." }),
            "GenerateProfile" => profile_value(),
            analysis => json!({
                "critique": format!("{}: the clinician's question was noted.", analysis),
                "notes_for_context": { "node": analysis }
            }),
        })
    }
}

// ── Checkpoints ──────────────────────────────────────────────────────────────

/// In-memory store that also keeps every saved state.
pub struct RecordingCheckpoints {
    inner: InMemoryCheckpointStore,
    saved: Mutex<Vec<ThreadState>>,
}

impl RecordingCheckpoints {
    pub fn new() -> Self {
        Self {
            inner: InMemoryCheckpointStore::new(),
            saved: Mutex::new(Vec::new()),
        }
    }

    pub fn saved(&self) -> Vec<ThreadState> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl CheckpointStore for RecordingCheckpoints {
    async fn load(&self, thread: &ThreadId) -> ClinisimResult<Option<ThreadState>> {
        self.inner.load(thread).await
    }

    async fn save(&self, state: &ThreadState) -> ClinisimResult<u64> {
        let version = self.inner.save(state).await?;
        let mut recorded = state.clone();
        recorded.version = version;
        self.saved.lock().unwrap().push(recorded);
        Ok(version)
    }

    async fn delete(&self, thread: &ThreadId) -> ClinisimResult<()> {
        self.inner.delete(thread).await
    }
}

// ── Ledger ───────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryLedger {
    sessions: Mutex<Vec<GradingSession>>,
    turns: Mutex<Vec<ConversationTurn>>,
}

#[async_trait]
impl ConversationLedger for MemoryLedger {
    async fn find_or_create_session(
        &self,
        user: UserId,
        profile: ProfileId,
    ) -> ClinisimResult<GradingSession> {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(s) = sessions.iter().find(|s| s.user_id == user && s.profile_id == profile) {
            return Ok(s.clone());
        }
        let now = Utc::now();
        let session = GradingSession {
            id: SessionId(sessions.len() as u64 + 1),
            user_id: user,
            profile_id: profile,
            total_score: 0.0,
            is_completed: false,
            agent_remarks: None,
            created_at: now,
            updated_at: now,
        };
        sessions.push(session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: SessionId) -> ClinisimResult<Option<GradingSession>> {
        Ok(self.sessions.lock().unwrap().iter().find(|s| s.id == id).cloned())
    }

    async fn sessions_for_user(&self, user: UserId) -> ClinisimResult<Vec<GradingSession>> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.user_id == user)
            .cloned()
            .collect())
    }

    async fn append_turn(&self, session: SessionId, turn: NewTurn) -> ClinisimResult<ConversationTurn> {
        let mut turns = self.turns.lock().unwrap();
        let stored = ConversationTurn {
            id: TurnId(turns.len() as u64 + 1),
            session_id: session,
            agent: turn.agent,
            content: turn.content,
            score: turn.score,
            metadata: turn.metadata,
            created_at: Utc::now(),
        };
        turns.push(stored.clone());
        Ok(stored)
    }

    async fn list_turns(&self, session: SessionId) -> ClinisimResult<Vec<ConversationTurn>> {
        Ok(self
            .turns
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.session_id == session)
            .cloned()
            .collect())
    }

    async fn update_session(&self, id: SessionId, update: SessionUpdate) -> ClinisimResult<GradingSession> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| ClinisimError::not_found("session", id))?;
        if let Some(score) = update.total_score {
            session.total_score = score;
        }
        if let Some(remarks) = update.agent_remarks {
            session.agent_remarks = Some(remarks);
        }
        if let Some(done) = update.is_completed {
            session.is_completed = done;
        }
        session.updated_at = Utc::now();
        Ok(session.clone())
    }
}
