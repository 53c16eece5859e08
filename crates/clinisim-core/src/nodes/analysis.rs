//! The seven analysis nodes, one function parameterised by facet.

use tracing::debug;

use clinisim_contracts::{
    analysis::{AnalysisOutput, ProfileSlice},
    error::ClinisimResult,
    thread::{GraphMessage, StateUpdate},
};

use crate::{
    gateway::invoke_structured,
    prompt, schemas,
    traits::{ChatRequest, ModelGateway},
};

/// Analyse one profile slice against the latest clinician utterance.
///
/// Reads nothing but its arguments. Gateway errors propagate unchanged.
pub async fn analyze(
    gateway: &dyn ModelGateway,
    slice: ProfileSlice,
    utterance: &str,
    temperature: f32,
) -> ClinisimResult<StateUpdate> {
    let facet = slice.facet();
    let (system, user) = prompt::analysis(&slice, utterance);
    let request = ChatRequest {
        node: facet.node_name().to_string(),
        system,
        user,
        temperature,
    };

    let output: AnalysisOutput =
        invoke_structured(gateway, &request, &schemas::analysis_output()).await?;
    debug!(facet = %facet, critique_len = output.critique.len(), "analysis complete");

    let note = GraphMessage::node(facet.node_name(), output.critique.clone());
    Ok(StateUpdate {
        analysis: Some((facet, output)),
        ..Default::default()
    }
    .message(note))
}
