use tracing::debug;

use clinisim_contracts::{
    error::{ClinisimError, ClinisimResult},
    profile::ProfileId,
    thread::{GraphMessage, StateUpdate},
};

use super::LOAD_PROFILE;
use crate::traits::ProfileStore;

/// Entry node of both pipelines. The only place "profile not found" arises.
pub async fn load_profile(store: &dyn ProfileStore, id: ProfileId) -> ClinisimResult<StateUpdate> {
    let profile = store
        .find_by_id(id)
        .await?
        .ok_or_else(|| ClinisimError::not_found("patient profile", id))?;
    profile.validate()?;

    debug!(profile_id = %id, case_id = %profile.case_metadata.case_id, "profile loaded");
    let note = format!("Patient profile loaded: {}", profile.case_metadata.case_id);
    Ok(StateUpdate {
        profile: Some(profile),
        ..Default::default()
    }
    .message(GraphMessage::node(LOAD_PROFILE, note)))
}
