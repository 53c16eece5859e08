//! Response synthesis: the patient's next utterance.

use tracing::{debug, warn};

use clinisim_contracts::{
    analysis::{AnalysisFacet, PatientReply},
    error::{ClinisimError, ClinisimResult},
    thread::{GraphMessage, StateUpdate, ThreadState},
};

use super::GENERATE_RESPONSE;
use crate::{
    gateway::invoke_structured,
    prompt, safety, schemas,
    traits::{ChatRequest, ModelGateway},
};

/// Synthesize the patient's reply from all seven analyses.
///
/// Runs only behind the fan-in barrier; a missing analysis here is a graph
/// bug and fails with `StateMachine`. The safety screen runs on both sides
/// of the model call.
pub async fn generate_response(
    gateway: &dyn ModelGateway,
    state: &ThreadState,
    window: usize,
    temperature: f32,
) -> ClinisimResult<StateUpdate> {
    let missing = state.missing_facets();
    if !missing.is_empty() {
        return Err(ClinisimError::StateMachine {
            reason: format!("synthesis reached with analyses missing: {:?}", missing),
        });
    }
    let profile = state.profile.as_ref().ok_or_else(|| ClinisimError::StateMachine {
        reason: "synthesis reached without a loaded profile".to_string(),
    })?;
    let utterance = state
        .clinician_utterance
        .as_deref()
        .ok_or_else(|| ClinisimError::StateMachine {
            reason: "synthesis reached without a clinician utterance".to_string(),
        })?;

    let mut update = StateUpdate::default();
    let mut analyses = state.analyses.clone();

    // ── Pre-synthesis screen ─────────────────────────────────────────────────
    if let Some(risk) = analyses.get_mut(&AnalysisFacet::Risk) {
        let mut signals = safety::detect_risk(utterance);
        signals.extend(safety::detect_risk(&risk.critique));
        if !signals.is_empty() && safety::enforce_escalation(&mut risk.critique) {
            warn!(
                thread_id = %state.thread_id,
                signals = ?signals,
                "risk disclosed without escalation in critique, escalation notice appended"
            );
            update.analysis = Some((AnalysisFacet::Risk, risk.clone()));
        }
    }

    let dialogue = state.dialogue(window);
    // The clinician's current utterance is already the last dialogue entry.
    let history = &dialogue[..dialogue.len().saturating_sub(1)];
    let (system, user) = prompt::synthesis(profile, &analyses, history, utterance);
    let request = ChatRequest {
        node: GENERATE_RESPONSE.to_string(),
        system,
        user,
        temperature,
    };
    let reply: PatientReply =
        invoke_structured(gateway, &request, &schemas::patient_reply()).await?;

    // ── Post-synthesis screen ────────────────────────────────────────────────
    if let Some(found) = safety::find_self_harm_instruction(&reply.patient_response) {
        warn!(thread_id = %state.thread_id, %found, "synthesized reply rejected by safety screen");
        return Err(ClinisimError::SafetyViolation {
            reason: format!("patient reply contains {}", found),
        });
    }

    // A patient whose profile carries risk may disclose it unprompted.
    if profile.risk_assessment.any_elevated() {
        let disclosed = safety::detect_risk(&reply.patient_response);
        if let Some(risk) = analyses.get_mut(&AnalysisFacet::Risk) {
            if !disclosed.is_empty() && safety::enforce_escalation(&mut risk.critique) {
                warn!(
                    thread_id = %state.thread_id,
                    signals = ?disclosed,
                    "patient disclosed risk, escalation notice appended"
                );
                update.analysis = Some((AnalysisFacet::Risk, risk.clone()));
            }
        }
    }

    debug!(thread_id = %state.thread_id, reply_len = reply.patient_response.len(), "reply synthesized");
    update.final_response = Some(reply.patient_response.clone());
    Ok(update.message(GraphMessage::patient(reply.patient_response)))
}
