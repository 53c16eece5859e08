use tracing::debug;

use clinisim_contracts::{
    analysis::TurnScore,
    error::ClinisimResult,
    profile::PatientProfile,
    thread::{GraphMessage, StateUpdate},
};

use super::SCORE_TURN;
use crate::{
    gateway::invoke_structured,
    prompt, schemas,
    traits::{ChatRequest, ModelGateway},
};

/// Incremental-mode scoring of one clinician turn, in [-100, 100].
pub async fn score_turn(
    gateway: &dyn ModelGateway,
    profile: &PatientProfile,
    utterance: &str,
    reply: &str,
    temperature: f32,
) -> ClinisimResult<StateUpdate> {
    let (system, user) = prompt::turn_score(profile, utterance, reply);
    let request = ChatRequest {
        node: SCORE_TURN.to_string(),
        system,
        user,
        temperature,
    };
    let score: TurnScore = invoke_structured(gateway, &request, &schemas::turn_score()).await?;
    debug!(score = score.score, "turn scored");

    let note = GraphMessage::node(SCORE_TURN, format!("score {}: {}", score.score, score.critique));
    Ok(StateUpdate {
        last_score: Some(score),
        ..Default::default()
    }
    .message(note))
}
