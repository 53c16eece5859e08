//! Prompt text for every model-backed node.
//!
//! Prompts always end with the exact JSON keys the node's output contract
//! requires, so the gateway can reject anything else.

use std::collections::BTreeMap;

use serde::Serialize;

use clinisim_contracts::{
    analysis::{AnalysisFacet, AnalysisOutput, ProfileSlice},
    profile::{PatientProfile, ScoringBlueprint},
    session::ConversationTurn,
    thread::{GraphMessage, MessageRole},
};

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

fn facet_focus(facet: AnalysisFacet) -> &'static str {
    match facet {
        AnalysisFacet::Risk => {
            "Judge whether the clinician is screening for suicide and homicide risk appropriately. \
             If the utterance or the patient's risk factors indicate self-harm or harm to others, \
             the critique MUST instruct the clinician to escalate and offer immediate help."
        }
        AnalysisFacet::MentalStatus => {
            "Describe how the patient's mental status should colour the reply (speech, mood, affect, thought content)."
        }
        AnalysisFacet::InteractionStyle => {
            "Describe how verbose, trusting or defensive the patient should be given the clinician's approach."
        }
        AnalysisFacet::DisclosurePolicy => {
            "Decide whether the clinician's wording earns disclosure of sensitive topics or should meet minimization."
        }
        AnalysisFacet::Symptoms => {
            "Decide which symptoms the patient may reveal now, honouring each symptom's disclosure rules."
        }
        AnalysisFacet::PrimaryDiagnosis => {
            "Note which diagnostic features the question touches, without revealing the diagnosis."
        }
        AnalysisFacet::RedFlags => {
            "Check whether the utterance hits a red-flag trigger and which follow-up a competent clinician would ask."
        }
    }
}

/// Analysis node prompt: (system, user).
pub fn analysis(slice: &ProfileSlice, utterance: &str) -> (String, String) {
    let facet = slice.facet();
    let system = format!(
        "You are a clinical educator analysing one facet ({}) of a simulated patient case. {}\n\
         Respond with a JSON object with exactly the keys \"critique\" (string) and \
         \"notes_for_context\" (any JSON value for the patient simulator).",
        facet,
        facet_focus(facet)
    );
    let user = format!(
        "Profile facet `{}`:\n{}\n\nLatest clinician utterance:\n\"{}\"",
        facet.profile_key(),
        to_json(slice),
        utterance
    );
    (system, user)
}

/// Response synthesis prompt.
pub fn synthesis(
    profile: &PatientProfile,
    analyses: &BTreeMap<AnalysisFacet, AnalysisOutput>,
    dialogue: &[&GraphMessage],
    utterance: &str,
) -> (String, String) {
    let system = "You are role-playing a patient in a clinical interview. Speak in the first person, \
         stay consistent with the case, your interaction style and disclosure policy. \
         If the conversation touches self-harm or harm to others, show appropriate distress \
         and never describe methods, doses or instructions for self-harm.\n\
         Respond with a JSON object with exactly one key, \"patient_response\" (string)."
        .to_string();

    let mut user = format!(
        "Case summary: {} ({}, {} setting). Chief complaint: \"{}\".\n\n",
        profile.primary_diagnosis.name,
        profile.case_metadata.case_id,
        profile.case_metadata.setting,
        profile.case_metadata.chief_complaint
    );
    user.push_str("Facet analyses:\n");
    for (facet, output) in analyses {
        user.push_str(&format!(
            "- {}: {}\n  notes: {}\n",
            facet, output.critique, output.notes_for_context
        ));
    }
    if !dialogue.is_empty() {
        user.push_str("\nConversation so far:\n");
        for message in dialogue {
            let speaker = match message.role {
                MessageRole::Clinician => "Clinician",
                MessageRole::Patient => "Patient",
                MessageRole::Node => continue,
            };
            user.push_str(&format!("{}: {}\n", speaker, message.content));
        }
    }
    user.push_str(&format!("\nClinician now says: \"{}\"\nReply as the patient.", utterance));
    (system, user)
}

/// Per-turn score prompt (incremental mode).
pub fn turn_score(profile: &PatientProfile, utterance: &str, reply: &str) -> (String, String) {
    let system = "You grade one clinician turn in a simulated psychiatric interview. \
         Score from -100 (harmful or clinically wrong) to 100 (excellent), weighing empathy, \
         relevance to the case and safety screening.\n\
         Respond with a JSON object with exactly the keys \"score\" (number) and \"critique\" (string)."
        .to_string();
    let user = format!(
        "Scoring blueprint:\n{}\n\nClinician: \"{}\"\nPatient: \"{}\"",
        to_json(&profile.scoring_blueprint),
        utterance,
        reply
    );
    (system, user)
}

/// Holistic grading prompt over the full stored transcript.
pub fn holistic_grade(
    profile: &PatientProfile,
    blueprint: &ScoringBlueprint,
    turns: &[ConversationTurn],
) -> (String, String) {
    let system = "You are an examiner grading a trainee's complete clinical interview against a rubric. \
         Give a grade from 0 to 100 (90+ excellent, 75-89 good with gaps, 60-74 significant \
         deficiency, below 60 unsafe or major omission).\n\
         Respond with a JSON object with the keys \"grade\", \"interviewFeedback\" \
         {strengths, areasForImprovement, missedQuestions}, \"correctedDiagnosis\" \
         {studentDiagnosis, correctDiagnosis, rationale, diagnosticCriteriaMissed}, \
         \"treatmentFeedback\" {studentTreatment, issues, recommendedAlternatives, \
         evidenceBasedRationale} and \"noteImprovementGuidance\"."
        .to_string();

    let mut user = format!(
        "Correct diagnosis: {} ({}).\nRecommended treatments: {}\n\nRubric:\n{}\n\nTranscript:\n",
        profile.primary_diagnosis.name,
        profile.primary_diagnosis.rationale,
        profile
            .treatment_options
            .recommended
            .iter()
            .map(|t| t.treatment_name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        to_json(blueprint)
    );
    for turn in turns {
        let speaker = if turn.agent { "Patient" } else { "Clinician" };
        user.push_str(&format!("{}: {}\n", speaker, turn.content));
    }
    (system, user)
}

/// First stage of profile generation.
pub fn chief_complaint(diagnosis: &str, instruction: Option<&str>) -> (String, String) {
    let system = "You write the chief complaint a patient would state in their own words at the \
         start of a visit.\nRespond with a JSON object with exactly one key, \"chief_complaint\"."
        .to_string();
    let mut user = format!("Diagnosis: {}", diagnosis);
    if let Some(extra) = instruction {
        user.push_str(&format!("\nAdditional instruction: {}", extra));
    }
    (system, user)
}

/// Second stage of profile generation.
pub fn patient_profile(
    diagnosis: &str,
    chief_complaint: &str,
    catalog: &[String],
    instruction: Option<&str>,
) -> (String, String) {
    let system = "You generate a realistic, schema-versioned (\"1.0\") patient case document for \
         clinical interview training as a single JSON object with the keys schema_version, \
         case_metadata, primary_diagnosis, rule_out_diagnoses, symptoms, pertinent_negatives, \
         risk_assessment, mental_status, interaction_style, disclosure_policy, treatment_options, \
         red_flag_triggers and scoring_blueprint. Every symptom severity is an integer from 0 to 3."
        .to_string();
    let mut user = format!(
        "Diagnosis: {}\nChief complaint: \"{}\"\nPrefer symptom, diagnosis and treatment names from this catalog: {}",
        diagnosis,
        chief_complaint,
        catalog.join(", ")
    );
    if let Some(extra) = instruction {
        user.push_str(&format!("\nAdditional instruction: {}", extra));
    }
    (system, user)
}
