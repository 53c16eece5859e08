//! Scenario 4: Profile Generation
//!
//! Sub-case A: a new case is generated for "Major depressive disorder". The
//! chief complaint is generated first, then the full profile around it. The
//! result is stored unpublished with catalog presence flags set.
//!
//! Sub-case B: the model returns a profile with a symptom of severity 4.
//! The document fails its output contract and nothing is stored.
//!
//! Sub-case C: an editor tries to set a stored symptom's severity to -1.

use serde_json::Value;

use clinisim_contracts::{
    error::{ClinisimError, ClinisimResult},
    profile::ProfileId,
    session::GradingMode,
};
use clinisim_core::{generator::GENERATE_PROFILE_NODE, traits::ProfileStore};

use crate::{
    sample_data::{sample_catalog, sample_profile_value},
    scenarios::scripted_runtime,
    scripted::ScriptedModel,
};

const GENERATED_ID: ProfileId = ProfileId(100);
const REJECTED_ID: ProfileId = ProfileId(101);

/// The sample profile with its first symptom at `severity`.
fn profile_with_severity(severity: i64) -> Value {
    let mut value = sample_profile_value();
    value["symptoms"][0]["severity"] = Value::from(severity);
    value
}

pub async fn run_scenario() -> ClinisimResult<()> {
    println!("=== Scenario 4: Profile Generation ===");
    println!();

    let catalog = sample_catalog();

    // ── Sub-case A: generate ─────────────────────────────────────────────────

    println!("  Sub-case A: generate a depression case");
    let runtime = scripted_runtime(GradingMode::Holistic, ScriptedModel::new()).await?;
    let mut profile = runtime
        .generator
        .generate(GENERATED_ID, "Major depressive disorder", &catalog, Some("make the patient a retired nurse"))
        .await?;

    println!("    Case:            {}", profile.case_metadata.case_id);
    println!("    Chief complaint: {}", profile.case_metadata.chief_complaint);
    println!("    Symptoms:        {}", profile.symptoms.len());
    println!("    Published:       {}", profile.saved);
    for symptom in &profile.symptoms {
        println!(
            "      - {:<20} severity {}  in catalog: {}",
            symptom.symptom_id,
            symptom.severity.value(),
            symptom.db_present
        );
    }
    println!();

    // ── Sub-case B: out-of-range severity from the model ─────────────────────

    println!("  Sub-case B: model returns severity 4");
    let model = ScriptedModel::new()
        .with_raw(GENERATE_PROFILE_NODE, profile_with_severity(4).to_string());
    let runtime_b = scripted_runtime(GradingMode::Holistic, model).await?;
    match runtime_b
        .generator
        .generate(REJECTED_ID, "Major depressive disorder", &catalog, None)
        .await
    {
        Err(e @ (ClinisimError::SchemaViolation { .. } | ClinisimError::Validation { .. })) => {
            println!("    Generation rejected: {}", e.kind());
        }
        Err(other) => return Err(other),
        Ok(_) => println!("    UNEXPECTED: profile with severity 4 accepted"),
    }
    let stored = runtime_b.ledger.find_by_id(REJECTED_ID).await?;
    println!("    Stored:              {}", stored.is_some());
    println!();

    // ── Sub-case C: out-of-range severity from an edit ───────────────────────

    println!("  Sub-case C: edit insomnia severity to -1");
    match profile.update_symptom_severity("insomnia", -1) {
        Err(ClinisimError::Validation { reason }) => println!("    Edit rejected: {}", reason),
        Err(other) => return Err(other),
        Ok(()) => println!("    UNEXPECTED: severity -1 accepted"),
    }

    println!();
    println!("  Scenario 4 complete.");
    println!();
    Ok(())
}
