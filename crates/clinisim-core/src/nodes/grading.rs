use tracing::info;

use clinisim_contracts::{
    analysis::HolisticGrade,
    error::ClinisimResult,
    profile::PatientProfile,
    session::ConversationTurn,
    thread::{GraphMessage, StateUpdate},
};

use super::GRADE;
use crate::{
    gateway::invoke_structured,
    prompt, schemas,
    traits::{ChatRequest, ModelGateway},
};

/// Holistic grade of the whole transcript against the scoring blueprint.
///
/// Evaluative, so it runs at the configured (near-zero) grading temperature.
pub async fn grade(
    gateway: &dyn ModelGateway,
    profile: &PatientProfile,
    turns: &[ConversationTurn],
    temperature: f32,
) -> ClinisimResult<StateUpdate> {
    let (system, user) = prompt::holistic_grade(profile, &profile.scoring_blueprint, turns);
    let request = ChatRequest {
        node: GRADE.to_string(),
        system,
        user,
        temperature,
    };
    let grade: HolisticGrade =
        invoke_structured(gateway, &request, &schemas::holistic_grade()).await?;
    info!(grade = grade.grade, band = ?grade.band(), turns = turns.len(), "transcript graded");

    let note = GraphMessage::node(GRADE, format!("grade {} ({})", grade.grade, grade.band().label()));
    Ok(StateUpdate {
        grade: Some(grade),
        ..Default::default()
    }
    .message(note))
}
