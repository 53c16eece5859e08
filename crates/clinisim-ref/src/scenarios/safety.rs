//! Scenario 2: Risk Disclosure and Reply Screening
//!
//! Sub-case A: the clinician raises self-harm. The risk analysis returned by
//! the model does not mention escalation, so the engine appends an escalation
//! notice before synthesis. The patient reply passes the safety screen.
//!
//! Sub-case B: the model is forced to answer with a reply that contains an
//! actionable overdose instruction. Synthesis fails with `SafetyViolation`,
//! the clinician turn stays in the ledger, and no patient turn is stored.

use clinisim_contracts::{
    analysis::AnalysisFacet,
    error::{ClinisimError, ClinisimResult},
    session::{GradingMode, ThreadId, UserId},
};
use clinisim_core::{nodes::GENERATE_RESPONSE, safety};

use crate::{
    sample_data::{SAMPLE_PROFILE_ID, SELF_HARM_UTTERANCE},
    scenarios::scripted_runtime,
    scripted::ScriptedModel,
};

const UNSAFE_REPLY: &str = r#"{"patient_response": "I looked it up. If I take all of my sleeping pills at once it would be enough."}"#;

pub async fn run_scenario() -> ClinisimResult<()> {
    println!("=== Scenario 2: Risk Disclosure and Reply Screening ===");
    println!();

    // ── Sub-case A: escalation enforced ──────────────────────────────────────

    println!("  Sub-case A: clinician asks about suicide");
    let runtime = scripted_runtime(GradingMode::Holistic, ScriptedModel::new()).await?;
    let session = runtime.sessions.open_session(UserId(11), SAMPLE_PROFILE_ID).await?;

    let committed = runtime.sessions.submit_turn(session.id, SELF_HARM_UTTERANCE).await?;
    println!("    Clinician: {}", committed.clinician.content);
    println!("    Patient:   {}", committed.patient.content);

    let thread = ThreadId::for_user(session.user_id, session.id);
    let state = runtime.graph.checkpoints().load(&thread).await?;
    let risk = state
        .as_ref()
        .and_then(|s| s.analyses.get(&AnalysisFacet::Risk))
        .map(|a| a.critique.clone())
        .unwrap_or_default();
    println!(
        "    Risk critique escalates:   {}",
        if safety::contains_escalation(&risk) { "YES" } else { "NO" }
    );
    println!(
        "    Reply screen:              {}",
        match safety::find_self_harm_instruction(&committed.patient.content) {
            Some(found) => format!("FLAGGED ({})", found),
            None => "PASS".to_string(),
        }
    );
    println!();

    // ── Sub-case B: unsafe reply rejected ────────────────────────────────────

    println!("  Sub-case B: model returns an instructional reply");
    let model = ScriptedModel::new().with_raw(GENERATE_RESPONSE, UNSAFE_REPLY);
    let runtime = scripted_runtime(GradingMode::Holistic, model).await?;
    let session = runtime.sessions.open_session(UserId(12), SAMPLE_PROFILE_ID).await?;

    match runtime.sessions.submit_turn(session.id, "How have you been coping at night?").await {
        Err(ClinisimError::SafetyViolation { reason }) => {
            println!("    Turn rejected:   SafetyViolation ({})", reason);
        }
        Err(other) => return Err(other),
        Ok(committed) => {
            println!("    UNEXPECTED: reply was stored: {}", committed.patient.content);
        }
    }
    let turns = runtime.sessions.transcript(session.id).await?;
    let patient_turns = turns.iter().filter(|t| t.agent).count();
    println!(
        "    Stored turns:    {} clinician, {} patient",
        turns.len() - patient_turns,
        patient_turns
    );

    println!();
    println!("  Scenario 2 complete.");
    println!();
    Ok(())
}
