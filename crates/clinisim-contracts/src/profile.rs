//! Patient profile document.
//!
//! A profile is the generated clinical case the simulated patient stays
//! consistent with. It is immutable for the lifetime of a grading session;
//! regeneration replaces it wholesale.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    analysis::{AnalysisFacet, ProfileSlice},
    error::{ClinisimError, ClinisimResult},
};

/// Schema major version this crate understands.
pub const SUPPORTED_SCHEMA_MAJOR: &str = "1";

/// Stable identifier of a stored patient profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProfileId(pub u64);

impl std::fmt::Display for ProfileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Severity ─────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
#[error("symptom severity {0} is outside the range 0-3")]
pub struct SeverityOutOfRange(pub i64);

/// Symptom severity on the 0-3 clinical scale.
///
/// The range is enforced on construction and on deserialization, so a
/// profile holding a `Severity` can never carry an out-of-range value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Severity(u8);

impl Severity {
    pub const MAX: u8 = 3;

    pub fn new(value: i64) -> Result<Self, SeverityOutOfRange> {
        Self::try_from(value)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Severity {
    type Error = SeverityOutOfRange;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (0..=Self::MAX as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(SeverityOutOfRange(value))
        }
    }
}

impl From<Severity> for u8 {
    fn from(s: Severity) -> u8 {
        s.0
    }
}

// ── Sub-documents ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Moderate,
    Hard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseMetadata {
    pub case_id: String,
    #[serde(default)]
    pub generation_seed: u64,
    pub difficulty: Difficulty,
    /// outpatient, inpatient, telehealth, ...
    pub setting: String,
    pub chief_complaint: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Moderate,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryDiagnosis {
    pub dx_id: u64,
    pub name: String,
    #[serde(default)]
    pub code: String,
    pub confidence: Confidence,
    pub rationale: String,
    /// Whether the diagnosis exists in the diagnosis catalog.
    #[serde(default = "default_true")]
    pub db_present: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOutDiagnosis {
    pub dx_id: u64,
    pub name: String,
    #[serde(default)]
    pub code: String,
    pub why_ruled_out: String,
    #[serde(default = "default_true")]
    pub db_present: bool,
}

/// When and how the patient is willing to talk about a symptom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DisclosureRules {
    pub spontaneous: bool,
    pub requires_open: bool,
    pub requires_direct: bool,
    pub requires_normalization: bool,
    pub requires_empathy_first: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symptom {
    pub symptom_id: String,
    #[serde(default)]
    pub symptom_code: String,
    #[serde(default)]
    pub symptom_name: String,
    pub present: bool,
    pub severity: Severity,
    pub disclosure_rules: DisclosureRules,
    #[serde(default = "default_true")]
    pub db_present: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SuicideRisk {
    pub passive_death_wish: bool,
    pub active_ideation: bool,
    pub plan: bool,
    pub intent: bool,
    #[serde(default)]
    pub protective_factors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub suicide_risk: SuicideRisk,
    pub homicide_risk: bool,
}

impl RiskAssessment {
    /// True when any suicide or homicide risk factor is present.
    pub fn any_elevated(&self) -> bool {
        let s = &self.suicide_risk;
        s.passive_death_wish || s.active_ideation || s.plan || s.intent || self.homicide_risk
    }
}

/// Mental status as observable over an audio-only interview.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MentalStatus {
    pub speech: String,
    pub mood: String,
    pub affect: String,
    pub thought_process: String,
    pub thought_content: String,
    pub perception: String,
    pub cognition: String,
    pub insight: String,
    pub judgment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Low,
    Moderate,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustBaseline {
    Guarded,
    Neutral,
    Open,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionStyle {
    pub verbosity: Verbosity,
    pub affect_style: String,
    pub trust_baseline: TrustBaseline,
    #[serde(default)]
    pub defensiveness_triggers: Vec<String>,
    #[serde(default)]
    pub engagement_improves_with: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DisclosurePolicy {
    #[serde(default)]
    pub sensitive_topics: Vec<String>,
    #[serde(default)]
    pub likely_minimization: Vec<String>,
    #[serde(default)]
    pub empathy_required_topics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentOption {
    pub treatment_id: String,
    #[serde(default)]
    pub treatment_name: String,
    #[serde(default)]
    pub treatment_code: String,
    pub rationale: String,
    #[serde(default = "default_true")]
    pub db_present: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TreatmentOptions {
    #[serde(default)]
    pub recommended: Vec<TreatmentOption>,
    #[serde(default)]
    pub alternatives: Vec<TreatmentOption>,
    #[serde(default)]
    pub not_recommended: Vec<TreatmentOption>,
}

impl TreatmentOptions {
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TreatmentOption> {
        self.recommended
            .iter_mut()
            .chain(self.alternatives.iter_mut())
            .chain(self.not_recommended.iter_mut())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedFlagTrigger {
    pub trigger: String,
    pub expected_follow_up: String,
}

/// The rubric the holistic grade is scored against.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoringBlueprint {
    #[serde(default)]
    pub must_elicit: Vec<String>,
    #[serde(default)]
    pub must_rule_out: Vec<String>,
    #[serde(default)]
    pub communication_goals: Vec<String>,
}

fn default_true() -> bool {
    true
}

// ── PatientProfile ───────────────────────────────────────────────────────────

/// The full generated clinical case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub schema_version: String,
    pub case_metadata: CaseMetadata,
    pub primary_diagnosis: PrimaryDiagnosis,
    #[serde(default)]
    pub rule_out_diagnoses: Vec<RuleOutDiagnosis>,
    #[serde(default)]
    pub symptoms: Vec<Symptom>,
    #[serde(default)]
    pub pertinent_negatives: Vec<String>,
    pub risk_assessment: RiskAssessment,
    #[serde(alias = "mental_status_audio_only")]
    pub mental_status: MentalStatus,
    pub interaction_style: InteractionStyle,
    #[serde(default)]
    pub disclosure_policy: DisclosurePolicy,
    #[serde(default)]
    pub treatment_options: TreatmentOptions,
    #[serde(default)]
    pub red_flag_triggers: Vec<RedFlagTrigger>,
    #[serde(default)]
    pub scoring_blueprint: ScoringBlueprint,
    /// Published to trainees once saved by an administrator.
    #[serde(default)]
    pub saved: bool,
}

impl PatientProfile {
    /// Check the invariants a profile must hold before it is stored or used.
    ///
    /// Severity bounds are already guaranteed by `Severity`; this covers the
    /// document-level rules.
    pub fn validate(&self) -> ClinisimResult<()> {
        let major = self.schema_version.split('.').next().unwrap_or_default();
        if major != SUPPORTED_SCHEMA_MAJOR {
            return Err(ClinisimError::validation(format!(
                "unsupported profile schema_version '{}'",
                self.schema_version
            )));
        }
        if self.primary_diagnosis.name.trim().is_empty() {
            return Err(ClinisimError::validation(
                "profile primary_diagnosis.name must not be empty",
            ));
        }
        if self.case_metadata.case_id.trim().is_empty() {
            return Err(ClinisimError::validation(
                "profile case_metadata.case_id must not be empty",
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for symptom in &self.symptoms {
            if !seen.insert(symptom.symptom_id.as_str()) {
                return Err(ClinisimError::validation(format!(
                    "duplicate symptom_id '{}'",
                    symptom.symptom_id
                )));
            }
        }
        Ok(())
    }

    /// Change one symptom's severity, keeping the 0-3 bound.
    pub fn update_symptom_severity(&mut self, symptom_id: &str, severity: i64) -> ClinisimResult<()> {
        let severity = Severity::new(severity).map_err(|e| ClinisimError::validation(e.to_string()))?;
        let symptom = self
            .symptoms
            .iter_mut()
            .find(|s| s.symptom_id == symptom_id)
            .ok_or_else(|| ClinisimError::not_found("symptom", symptom_id))?;
        symptom.severity = severity;
        Ok(())
    }

    /// The sub-document a given analysis node reads.
    pub fn slice(&self, facet: AnalysisFacet) -> ProfileSlice {
        match facet {
            AnalysisFacet::Risk => ProfileSlice::Risk(self.risk_assessment.clone()),
            AnalysisFacet::MentalStatus => ProfileSlice::MentalStatus(self.mental_status.clone()),
            AnalysisFacet::InteractionStyle => {
                ProfileSlice::InteractionStyle(self.interaction_style.clone())
            }
            AnalysisFacet::DisclosurePolicy => {
                ProfileSlice::DisclosurePolicy(self.disclosure_policy.clone())
            }
            AnalysisFacet::Symptoms => ProfileSlice::Symptoms(self.symptoms.clone()),
            AnalysisFacet::PrimaryDiagnosis => {
                ProfileSlice::PrimaryDiagnosis(self.primary_diagnosis.clone())
            }
            AnalysisFacet::RedFlags => ProfileSlice::RedFlags(self.red_flag_triggers.clone()),
        }
    }
}
