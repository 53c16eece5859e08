//! Output contracts for every model call the engine makes.

use serde_json::{json, Value};

use clinisim_contracts::verify::{OutputSchema, VerificationRuleType};

pub const ANALYSIS_OUTPUT: &str = "analysis-output-v1";
pub const PATIENT_REPLY: &str = "patient-reply-v1";
pub const TURN_SCORE: &str = "turn-score-v1";
pub const HOLISTIC_GRADE: &str = "holistic-grade-v1";
pub const CHIEF_COMPLAINT: &str = "chief-complaint-v1";
pub const PATIENT_PROFILE: &str = "patient-profile-v1";

fn string_array() -> Value {
    json!({ "type": "array", "items": { "type": "string" } })
}

pub fn analysis_output() -> OutputSchema {
    OutputSchema::new(
        ANALYSIS_OUTPUT,
        json!({
            "type": "object",
            "properties": {
                "critique": { "type": "string" },
                "notes_for_context": {}
            },
            "required": ["critique", "notes_for_context"]
        }),
    )
    .with_rule(
        "critique-non-empty",
        "every analysis must say something",
        VerificationRuleType::NonEmptyString {
            field_path: "critique".into(),
        },
    )
}

pub fn patient_reply() -> OutputSchema {
    OutputSchema::new(
        PATIENT_REPLY,
        json!({
            "type": "object",
            "properties": { "patient_response": { "type": "string" } },
            "required": ["patient_response"],
            "additionalProperties": false
        }),
    )
    .with_rule(
        "reply-non-empty",
        "the patient always answers",
        VerificationRuleType::NonEmptyString {
            field_path: "patient_response".into(),
        },
    )
}

pub fn turn_score() -> OutputSchema {
    OutputSchema::new(
        TURN_SCORE,
        json!({
            "type": "object",
            "properties": {
                "score": { "type": "number" },
                "critique": { "type": "string" }
            },
            "required": ["score", "critique"]
        }),
    )
    .with_rule(
        "score-range",
        "per-turn score is within -100..100",
        VerificationRuleType::NumericRange {
            field_path: "score".into(),
            min: -100.0,
            max: 100.0,
        },
    )
}

pub fn holistic_grade() -> OutputSchema {
    OutputSchema::new(
        HOLISTIC_GRADE,
        json!({
            "type": "object",
            "properties": {
                "grade": { "type": "number" },
                "interviewFeedback": {
                    "type": "object",
                    "properties": {
                        "strengths": string_array(),
                        "areasForImprovement": string_array(),
                        "missedQuestions": string_array()
                    },
                    "required": ["strengths", "areasForImprovement", "missedQuestions"]
                },
                "correctedDiagnosis": {
                    "type": "object",
                    "properties": {
                        "studentDiagnosis": { "type": "string" },
                        "correctDiagnosis": { "type": "string" },
                        "rationale": { "type": "string" },
                        "diagnosticCriteriaMissed": string_array()
                    },
                    "required": ["studentDiagnosis", "correctDiagnosis", "rationale", "diagnosticCriteriaMissed"]
                },
                "treatmentFeedback": {
                    "type": "object",
                    "properties": {
                        "studentTreatment": { "type": "string" },
                        "issues": string_array(),
                        "recommendedAlternatives": string_array(),
                        "evidenceBasedRationale": { "type": "string" }
                    },
                    "required": ["studentTreatment", "issues", "recommendedAlternatives", "evidenceBasedRationale"]
                },
                "noteImprovementGuidance": { "type": "string" }
            },
            "required": [
                "grade",
                "interviewFeedback",
                "correctedDiagnosis",
                "treatmentFeedback",
                "noteImprovementGuidance"
            ]
        }),
    )
    .with_rule(
        "grade-range",
        "holistic grade is within 0..100",
        VerificationRuleType::NumericRange {
            field_path: "grade".into(),
            min: 0.0,
            max: 100.0,
        },
    )
    .with_rule(
        "correct-diagnosis-named",
        "feedback must name the correct diagnosis",
        VerificationRuleType::NonEmptyString {
            field_path: "correctedDiagnosis.correctDiagnosis".into(),
        },
    )
}

pub fn chief_complaint() -> OutputSchema {
    OutputSchema::new(
        CHIEF_COMPLAINT,
        json!({
            "type": "object",
            "properties": { "chief_complaint": { "type": "string" } },
            "required": ["chief_complaint"]
        }),
    )
    .with_rule(
        "complaint-non-empty",
        "chief complaint must be stated",
        VerificationRuleType::NonEmptyString {
            field_path: "chief_complaint".into(),
        },
    )
}

pub fn patient_profile() -> OutputSchema {
    let severity = json!({ "type": "integer", "minimum": 0, "maximum": 3 });
    OutputSchema::new(
        PATIENT_PROFILE,
        json!({
            "type": "object",
            "properties": {
                "schema_version": { "type": "string" },
                "case_metadata": {
                    "type": "object",
                    "required": ["case_id", "difficulty", "setting", "chief_complaint"]
                },
                "primary_diagnosis": {
                    "type": "object",
                    "properties": { "name": { "type": "string" } },
                    "required": ["name", "confidence", "rationale"]
                },
                "symptoms": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": { "severity": severity },
                        "required": ["symptom_id", "present", "severity", "disclosure_rules"]
                    }
                },
                "risk_assessment": { "type": "object" },
                "mental_status": { "type": "object" },
                "interaction_style": { "type": "object" }
            },
            "required": [
                "schema_version",
                "case_metadata",
                "primary_diagnosis",
                "symptoms",
                "risk_assessment",
                "mental_status",
                "interaction_style"
            ]
        }),
    )
    .with_rule(
        "primary-diagnosis-present",
        "primary diagnosis is mandatory",
        VerificationRuleType::RequiredField {
            field_path: "primary_diagnosis.name".into(),
        },
    )
    .with_rule(
        "difficulty-known",
        "difficulty is one of the supported levels",
        VerificationRuleType::AllowedValues {
            field_path: "case_metadata.difficulty".into(),
            allowed: vec![json!("easy"), json!("moderate"), json!("hard")],
        },
    )
}
