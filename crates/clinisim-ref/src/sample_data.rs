//! Sample cases and reference catalog for the clinisim reference runtime.
//!
//! All data in this module is hardcoded and fictional. It stands in for the
//! profile tables and reference catalogs of a production deployment.

use serde_json::{json, Value};

use clinisim_contracts::{
    error::{ClinisimError, ClinisimResult},
    profile::{PatientProfile, ProfileId},
};
use clinisim_core::generator::{Catalog, CatalogEntry};

/// The profile every scenario interviews.
pub const SAMPLE_PROFILE_ID: ProfileId = ProfileId(42);

// ── Patient profile (mock) ───────────────────────────────────────────────────

/// A moderate major depressive episode with passive death wish, as raw JSON.
///
/// The scripted model also returns this document for `GenerateProfile`.
pub fn sample_profile_value() -> Value {
    json!({
        "schema_version": "1.0",
        "case_metadata": {
            "case_id": "case-mdd-042",
            "generation_seed": 42,
            "difficulty": "moderate",
            "setting": "outpatient",
            "chief_complaint": "I can't sleep and nothing feels worth doing anymore."
        },
        "primary_diagnosis": {
            "dx_id": 311,
            "name": "Major depressive disorder",
            "code": "F32.1",
            "confidence": "high",
            "rationale": "Eight weeks of low mood, anhedonia, early waking and poor concentration"
        },
        "rule_out_diagnoses": [
            {
                "dx_id": 296,
                "name": "Bipolar disorder",
                "code": "F31",
                "why_ruled_out": "No history of elevated mood or decreased need for sleep"
            },
            {
                "dx_id": 244,
                "name": "Hypothyroidism",
                "code": "E03.9",
                "why_ruled_out": "Normal TSH at last primary care visit"
            }
        ],
        "symptoms": [
            {
                "symptom_id": "insomnia",
                "symptom_code": "G47.00",
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
            },
            {
                "symptom_id": "poor_concentration",
                "symptom_name": "Poor concentration",
                "present": true,
                "severity": 1,
                "disclosure_rules": {
                    "spontaneous": false, "requires_open": false, "requires_direct": true,
                    "requires_normalization": false, "requires_empathy_first": false
                }
            },
            {
                "symptom_id": "passive_death_wish",
                "symptom_name": "Passive death wish",
                "present": true,
                "severity": 2,
                "disclosure_rules": {
                    "spontaneous": false, "requires_open": false, "requires_direct": true,
                    "requires_normalization": true, "requires_empathy_first": true
                }
            }
        ],
        "pertinent_negatives": ["no psychotic symptoms", "no substance use", "no prior manic episodes"],
        "risk_assessment": {
            "suicide_risk": {
                "passive_death_wish": true,
                "active_ideation": false,
                "plan": false,
                "intent": false,
                "protective_factors": ["daughter", "religious faith"]
            },
            "homicide_risk": false
        },
        "mental_status": {
            "speech": "slow, quiet, long pauses",
            "mood": "\"empty\"",
            "affect": "constricted",
            "thought_process": "linear",
            "thought_content": "hopelessness, guilt about not working",
            "perception": "no hallucinations reported",
            "cognition": "grossly intact, slow to answer",
            "insight": "partial",
            "judgment": "fair"
        },
        "interaction_style": {
            "verbosity": "low",
            "affect_style": "flat, apologetic",
            "trust_baseline": "guarded",
            "defensiveness_triggers": ["being rushed", "questions that sound like blame"],
            "engagement_improves_with": ["validation", "open questions", "silence"]
        },
        "disclosure_policy": {
            "sensitive_topics": ["death wish", "job loss"],
            "likely_minimization": ["alcohol", "how bad the mornings are"],
            "empathy_required_topics": ["death wish"]
        },
        "treatment_options": {
            "recommended": [
                {
                    "treatment_id": "ssri",
                    "treatment_name": "Sertraline",
                    "treatment_code": "N06AB06",
                    "rationale": "First-line SSRI for a moderate depressive episode"
                },
                {
                    "treatment_id": "cbt",
                    "treatment_name": "Cognitive behavioural therapy",
                    "rationale": "Effective alone or combined with medication"
                }
            ],
            "alternatives": [{
                "treatment_id": "mirtazapine",
                "treatment_name": "Mirtazapine",
                "rationale": "Useful when insomnia is prominent"
            }],
            "not_recommended": [{
                "treatment_id": "benzodiazepine",
                "treatment_name": "Long-term benzodiazepine",
                "rationale": "Dependence risk and no antidepressant effect"
            }]
        },
        "red_flag_triggers": [
            {
                "trigger": "says everyone would be better off without them",
                "expected_follow_up": "ask directly about suicidal thoughts, plan and intent"
            },
            {
                "trigger": "mentions stockpiling medication",
                "expected_follow_up": "assess means and arrange same-day safety planning"
            }
        ],
        "scoring_blueprint": {
            "must_elicit": ["sleep pattern", "anhedonia", "suicidal ideation", "duration"],
            "must_rule_out": ["bipolar disorder", "substance use"],
            "communication_goals": ["open questions", "empathic statements", "summarising"]
        },
        "saved": true
    })
}

pub fn sample_profile() -> ClinisimResult<PatientProfile> {
    serde_json::from_value(sample_profile_value())
        .map_err(|e| ClinisimError::validation(format!("sample profile does not parse: {}", e)))
}

// ── Reference catalog (mock) ─────────────────────────────────────────────────

/// Diagnoses, symptoms and treatments a generated profile is checked against.
pub fn sample_catalog() -> Catalog {
    Catalog {
        diagnoses: vec![
            CatalogEntry::new("F32.1", "Major depressive disorder"),
            CatalogEntry::new("F31", "Bipolar disorder"),
            CatalogEntry::new("F41.1", "Generalized anxiety disorder"),
        ],
        symptoms: vec![
            CatalogEntry::new("G47.00", "Insomnia"),
            CatalogEntry::new("R45.86", "Anhedonia"),
            CatalogEntry::new("R41.840", "Poor concentration"),
        ],
        treatments: vec![
            CatalogEntry::new("N06AB06", "Sertraline"),
            CatalogEntry::new("N06AX11", "Mirtazapine"),
        ],
    }
}

// ── Interview scripts ────────────────────────────────────────────────────────

/// Six clinician utterances covering the blueprint's must-elicit items.
pub const INTERVIEW_SCRIPT: [&str; 6] = [
    "Tell me about your sleep",
    "What do you still enjoy doing these days?",
    "How long have you been feeling this way?",
    "Have you had any thoughts that life isn't worth living?",
    "Have you ever had periods where you felt unusually energetic or needed little sleep?",
    "It sounds like the last two months have been really hard. What would help most right now?",
];

/// A clinician turn disclosing explicit self-harm intent on the patient's
/// behalf, used by the safety scenario.
pub const SELF_HARM_UTTERANCE: &str =
    "You said you want to kill yourself. Are you thinking about suicide right now?";
