//! Scenario 3: Holistic Completion
//!
//! The full interview is run with holistic grading, then the session is
//! completed. The Grade node reviews the whole transcript and returns a
//! grade with structured remarks, which become the session's final score.
//!
//! Completion is one-way: a second request is rejected and the stored
//! result is unchanged.

use clinisim_contracts::{
    error::{ClinisimError, ClinisimResult},
    session::{GradingMode, UserId},
};

use crate::{
    sample_data::{INTERVIEW_SCRIPT, SAMPLE_PROFILE_ID},
    scenarios::scripted_runtime,
    scripted::ScriptedModel,
};

pub async fn run_scenario() -> ClinisimResult<()> {
    println!("=== Scenario 3: Holistic Completion ===");
    println!();

    let runtime = scripted_runtime(GradingMode::Holistic, ScriptedModel::new()).await?;
    let session = runtime.sessions.open_session(UserId(21), SAMPLE_PROFILE_ID).await?;

    for utterance in INTERVIEW_SCRIPT {
        runtime.sessions.submit_turn(session.id, utterance).await?;
    }
    println!("  Interview: {} clinician turn(s) committed", INTERVIEW_SCRIPT.len());
    println!();

    // ── Complete ─────────────────────────────────────────────────────────────

    let outcome = runtime.sessions.complete(session.id).await?;
    let feedback = &outcome.agent_remarks.interview_feedback;
    let diagnosis = &outcome.agent_remarks.corrected_diagnosis;

    println!("  Grade:              {} ({})", outcome.grade, outcome.band.label());
    println!("  Session score:      {}", outcome.total_score);
    println!("  Strengths:          {}", feedback.strengths.join(", "));
    println!("  Missed questions:   {}", feedback.missed_questions.join(", "));
    println!("  Correct diagnosis:  {}", diagnosis.correct_diagnosis);
    println!(
        "  Note guidance:      {}",
        outcome.agent_remarks.note_improvement_guidance
    );
    println!();

    // ── Second completion ────────────────────────────────────────────────────

    match runtime.sessions.complete(session.id).await {
        Err(ClinisimError::SessionCompleted { .. }) => {
            println!("  Second completion:  rejected (session already completed)");
        }
        Err(other) => return Err(other),
        Ok(_) => println!("  UNEXPECTED: session was graded twice"),
    }
    let result = runtime.sessions.result(session.id).await?;
    println!(
        "  Stored result:      score {}, completed {}",
        result.total_score, result.is_completed
    );

    println!();
    println!("  Scenario 3 complete.");
    println!();
    Ok(())
}
