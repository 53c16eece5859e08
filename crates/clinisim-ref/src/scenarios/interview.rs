//! Scenario 1: Incremental Interview
//!
//! A clinician works through the six-question script against the sample
//! depression case with per-turn scoring on. Each turn runs the full graph:
//! profile load, the seven parallel analyses, reply synthesis, and ScoreTurn.
//! The running total on the session is updated after every committed turn.
//!
//! At the end the session's hash-chained transcript is checked for integrity.

use clinisim_contracts::{
    error::ClinisimResult,
    session::{GradingMode, ThreadId, UserId},
};

use crate::{
    sample_data::{INTERVIEW_SCRIPT, SAMPLE_PROFILE_ID},
    scenarios::{scripted_runtime, status},
    scripted::ScriptedModel,
};

pub async fn run_scenario() -> ClinisimResult<()> {
    println!("=== Scenario 1: Incremental Interview ===");
    println!();

    let runtime = scripted_runtime(GradingMode::Incremental, ScriptedModel::new()).await?;
    let session = runtime.sessions.open_session(UserId(7), SAMPLE_PROFILE_ID).await?;

    println!("  Session:      {}", session.id);
    println!("  Case:         profile {} (major depressive disorder)", SAMPLE_PROFILE_ID);
    println!("  Grading mode: incremental");
    println!();

    // ── Interview ────────────────────────────────────────────────────────────

    for (i, utterance) in INTERVIEW_SCRIPT.iter().enumerate() {
        let committed = runtime.sessions.submit_turn(session.id, utterance).await?;
        println!("  [{}] Clinician: {}", i + 1, committed.clinician.content);
        println!("      Patient:   {}", committed.patient.content);
        println!(
            "      Score:     {:+}  (running total {})",
            committed.patient.score.unwrap_or(0.0),
            committed.total_score
        );
    }
    println!();

    // ── Thread checkpoint ────────────────────────────────────────────────────

    let thread = ThreadId::for_user(session.user_id, session.id);
    if let Some(state) = runtime.graph.checkpoints().load(&thread).await? {
        println!("  Thread {} at version {}", thread, state.version);
        println!("  Analyses in last turn: {}", state.analyses.len());
        println!("  Graph messages:        {}", state.messages.len());
    }

    // ── Ledger integrity ─────────────────────────────────────────────────────

    let export = runtime.ledger.export_transcript(session.id)?;
    let intact = runtime.ledger.verify_integrity(session.id)?;
    println!(
        "  Transcript chain:      {} ({} turn(s), terminal hash {}...)",
        status(intact),
        export.entries.len(),
        export.terminal_hash.get(..12).unwrap_or("")
    );

    println!();
    println!("  Scenario 1 complete.");
    println!();
    Ok(())
}
