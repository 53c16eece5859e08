//! Per-node inputs and outputs of the orchestration graph.
//!
//! Each analysis node reads exactly one typed profile slice. Node outputs are
//! plain structs deserialized from the model's JSON after it has passed the
//! node's output contract.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    profile::{
        DisclosurePolicy, InteractionStyle, MentalStatus, PrimaryDiagnosis, RedFlagTrigger,
        RiskAssessment, Symptom,
    },
    session::{AgentRemarks, GradeBand},
};

/// The seven facets of the profile analysed on every turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisFacet {
    Risk,
    MentalStatus,
    InteractionStyle,
    DisclosurePolicy,
    Symptoms,
    PrimaryDiagnosis,
    RedFlags,
}

impl AnalysisFacet {
    pub const ALL: [AnalysisFacet; 7] = [
        AnalysisFacet::Risk,
        AnalysisFacet::MentalStatus,
        AnalysisFacet::InteractionStyle,
        AnalysisFacet::DisclosurePolicy,
        AnalysisFacet::Symptoms,
        AnalysisFacet::PrimaryDiagnosis,
        AnalysisFacet::RedFlags,
    ];

    /// Profile key this facet reads, as it appears in the profile document.
    pub fn profile_key(self) -> &'static str {
        match self {
            AnalysisFacet::Risk => "risk_assessment",
            AnalysisFacet::MentalStatus => "mental_status",
            AnalysisFacet::InteractionStyle => "interaction_style",
            AnalysisFacet::DisclosurePolicy => "disclosure_policy",
            AnalysisFacet::Symptoms => "symptoms",
            AnalysisFacet::PrimaryDiagnosis => "primary_diagnosis",
            AnalysisFacet::RedFlags => "red_flag_triggers",
        }
    }

    /// Graph node name, used in logs, timeouts, and the message transcript.
    pub fn node_name(self) -> &'static str {
        match self {
            AnalysisFacet::Risk => "AnalyzeRisk",
            AnalysisFacet::MentalStatus => "AnalyzeMentalStatus",
            AnalysisFacet::InteractionStyle => "AnalyzeInteractionStyle",
            AnalysisFacet::DisclosurePolicy => "AnalyzeDisclosurePolicy",
            AnalysisFacet::Symptoms => "AnalyzeSymptoms",
            AnalysisFacet::PrimaryDiagnosis => "AnalyzePrimaryDiagnosis",
            AnalysisFacet::RedFlags => "AnalyzeRedFlags",
        }
    }
}

impl std::fmt::Display for AnalysisFacet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.profile_key())
    }
}

/// The sub-document handed to one analysis node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProfileSlice {
    Risk(RiskAssessment),
    MentalStatus(MentalStatus),
    InteractionStyle(InteractionStyle),
    DisclosurePolicy(DisclosurePolicy),
    Symptoms(Vec<Symptom>),
    PrimaryDiagnosis(PrimaryDiagnosis),
    RedFlags(Vec<RedFlagTrigger>),
}

impl ProfileSlice {
    pub fn facet(&self) -> AnalysisFacet {
        match self {
            ProfileSlice::Risk(_) => AnalysisFacet::Risk,
            ProfileSlice::MentalStatus(_) => AnalysisFacet::MentalStatus,
            ProfileSlice::InteractionStyle(_) => AnalysisFacet::InteractionStyle,
            ProfileSlice::DisclosurePolicy(_) => AnalysisFacet::DisclosurePolicy,
            ProfileSlice::Symptoms(_) => AnalysisFacet::Symptoms,
            ProfileSlice::PrimaryDiagnosis(_) => AnalysisFacet::PrimaryDiagnosis,
            ProfileSlice::RedFlags(_) => AnalysisFacet::RedFlags,
        }
    }
}

// ── Node outputs ─────────────────────────────────────────────────────────────

/// Output of one analysis node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub critique: String,
    /// Free-form context for the synthesis node. Opaque to the engine.
    #[serde(default)]
    pub notes_for_context: Value,
}

/// Output of the response synthesis node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientReply {
    pub patient_response: String,
}

/// Output of the per-turn scoring node (incremental mode).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnScore {
    /// In [-100, 100].
    pub score: f64,
    pub critique: String,
}

/// Output of the holistic grading node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolisticGrade {
    /// In [0, 100].
    pub grade: f64,
    #[serde(flatten)]
    pub remarks: AgentRemarks,
}

impl HolisticGrade {
    pub fn band(&self) -> GradeBand {
        GradeBand::from_grade(self.grade)
    }
}

/// First stage of profile generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChiefComplaint {
    pub chief_complaint: String,
}
