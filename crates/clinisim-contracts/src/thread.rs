//! Checkpointed per-thread graph state.
//!
//! A `ThreadState` is everything the orchestration graph knows about one
//! thread between invocations. Nodes never mutate it directly: each returns a
//! `StateUpdate` and the graph merges updates with `ThreadState::apply`.
//!
//! Merge rules per field:
//!
//! - `profile`, `final_response`, `last_score`, `grade`: overwrite when set
//! - `analyses`: keyed by facet; each analysis node owns one key
//! - `messages`: append, never overwrite

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    analysis::{AnalysisFacet, AnalysisOutput, HolisticGrade, TurnScore},
    profile::PatientProfile,
    session::ThreadId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    Clinician,
    Patient,
    /// Progress notes written by graph nodes.
    Node,
}

/// One entry in the thread's durable message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphMessage {
    pub role: MessageRole,
    /// Writing node, for `MessageRole::Node` entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    pub content: String,
    pub at: DateTime<Utc>,
}

impl GraphMessage {
    pub fn clinician(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Clinician,
            node: None,
            content: content.into(),
            at: Utc::now(),
        }
    }

    pub fn patient(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Patient,
            node: None,
            content: content.into(),
            at: Utc::now(),
        }
    }

    pub fn node(node: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Node,
            node: Some(node.into()),
            content: content.into(),
            at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadState {
    pub thread_id: ThreadId,
    /// Bumped by the checkpoint store on every save.
    pub version: u64,
    /// Interactive turns started on this thread.
    pub turn: u64,
    pub profile: Option<PatientProfile>,
    #[serde(default)]
    pub analyses: BTreeMap<AnalysisFacet, AnalysisOutput>,
    #[serde(default)]
    pub messages: Vec<GraphMessage>,
    pub clinician_utterance: Option<String>,
    pub final_response: Option<String>,
    pub last_score: Option<TurnScore>,
    pub grade: Option<HolisticGrade>,
    pub updated_at: DateTime<Utc>,
}

impl ThreadState {
    pub fn new(thread_id: ThreadId) -> Self {
        Self {
            thread_id,
            version: 0,
            turn: 0,
            profile: None,
            analyses: BTreeMap::new(),
            messages: Vec::new(),
            clinician_utterance: None,
            final_response: None,
            last_score: None,
            grade: None,
            updated_at: Utc::now(),
        }
    }

    /// Reset per-turn fields and record the clinician's utterance.
    ///
    /// Analyses from the previous turn are discarded here so synthesis can
    /// never read a stale facet; the message log is kept.
    pub fn begin_turn(&mut self, utterance: &str) {
        self.turn += 1;
        self.analyses.clear();
        self.final_response = None;
        self.last_score = None;
        self.clinician_utterance = Some(utterance.to_string());
        self.messages.push(GraphMessage::clinician(utterance));
        self.updated_at = Utc::now();
    }

    /// Merge one node's update into the state.
    pub fn apply(&mut self, update: StateUpdate) {
        if let Some(profile) = update.profile {
            self.profile = Some(profile);
        }
        if let Some((facet, output)) = update.analysis {
            self.analyses.insert(facet, output);
        }
        if let Some(response) = update.final_response {
            self.final_response = Some(response);
        }
        if let Some(score) = update.last_score {
            self.last_score = Some(score);
        }
        if let Some(grade) = update.grade {
            self.grade = Some(grade);
        }
        self.messages.extend(update.messages);
        self.updated_at = Utc::now();
    }

    /// Facets with no output yet, in canonical order.
    pub fn missing_facets(&self) -> Vec<AnalysisFacet> {
        AnalysisFacet::ALL
            .iter()
            .copied()
            .filter(|f| !self.analyses.contains_key(f))
            .collect()
    }

    /// The last `window` clinician/patient exchanges, oldest first.
    pub fn dialogue(&self, window: usize) -> Vec<&GraphMessage> {
        let dialogue: Vec<&GraphMessage> = self
            .messages
            .iter()
            .filter(|m| m.role != MessageRole::Node)
            .collect();
        let skip = dialogue.len().saturating_sub(window);
        dialogue.into_iter().skip(skip).collect()
    }
}

/// The partial state a node returns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub profile: Option<PatientProfile>,
    pub analysis: Option<(AnalysisFacet, AnalysisOutput)>,
    pub final_response: Option<String>,
    pub last_score: Option<TurnScore>,
    pub grade: Option<HolisticGrade>,
    pub messages: Vec<GraphMessage>,
}

impl StateUpdate {
    pub fn message(mut self, message: GraphMessage) -> Self {
        self.messages.push(message);
        self
    }
}
