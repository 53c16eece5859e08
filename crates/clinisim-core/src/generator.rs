//! Patient profile generation.
//!
//! Two model calls: a chief complaint in the patient's words, then the full
//! case document built around it. The result is validated, cross-checked
//! against the reference catalog (`db_present`), and stored unpublished.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use clinisim_contracts::{
    analysis::ChiefComplaint,
    error::{ClinisimError, ClinisimResult},
    profile::{PatientProfile, ProfileId},
};

use crate::{
    gateway::invoke_structured,
    prompt, schemas,
    traits::{ChatRequest, ModelGateway, ProfileStore},
};

pub const CHIEF_COMPLAINT_NODE: &str = "ChiefComplaint";
pub const GENERATE_PROFILE_NODE: &str = "GenerateProfile";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub code: String,
    pub name: String,
}

impl CatalogEntry {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

/// Reference data the generated profile is checked against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub diagnoses: Vec<CatalogEntry>,
    pub symptoms: Vec<CatalogEntry>,
    pub treatments: Vec<CatalogEntry>,
}

impl Catalog {
    fn names(&self) -> Vec<String> {
        self.diagnoses
            .iter()
            .chain(&self.symptoms)
            .chain(&self.treatments)
            .map(|e| e.name.clone())
            .collect()
    }
}

/// True when `name` or `code` matches an entry, ignoring case.
fn present(entries: &[CatalogEntry], name: &str, code: &str) -> bool {
    entries.iter().any(|e| {
        (!name.is_empty() && e.name.eq_ignore_ascii_case(name))
            || (!code.is_empty() && e.code.eq_ignore_ascii_case(code))
    })
}

/// Set every `db_present` flag in `profile` from `catalog`.
pub fn mark_catalog_presence(profile: &mut PatientProfile, catalog: &Catalog) {
    let dx = &mut profile.primary_diagnosis;
    dx.db_present = present(&catalog.diagnoses, &dx.name, &dx.code);
    for rule_out in &mut profile.rule_out_diagnoses {
        rule_out.db_present = present(&catalog.diagnoses, &rule_out.name, &rule_out.code);
    }
    for symptom in &mut profile.symptoms {
        let name = if symptom.symptom_name.is_empty() {
            symptom.symptom_id.clone()
        } else {
            symptom.symptom_name.clone()
        };
        symptom.db_present = present(&catalog.symptoms, &name, &symptom.symptom_code);
    }
    for treatment in profile.treatment_options.iter_mut() {
        treatment.db_present = present(
            &catalog.treatments,
            &treatment.treatment_name,
            &treatment.treatment_code,
        );
    }
}

pub struct ProfileGenerator {
    gateway: Arc<dyn ModelGateway>,
    profiles: Arc<dyn ProfileStore>,
    temperature: f32,
}

impl ProfileGenerator {
    pub fn new(gateway: Arc<dyn ModelGateway>, profiles: Arc<dyn ProfileStore>, temperature: f32) -> Self {
        Self {
            gateway,
            profiles,
            temperature,
        }
    }

    /// Generate a profile for `diagnosis` and store it under `id`.
    pub async fn generate(
        &self,
        id: ProfileId,
        diagnosis: &str,
        catalog: &Catalog,
        instruction: Option<&str>,
    ) -> ClinisimResult<PatientProfile> {
        if diagnosis.trim().is_empty() {
            return Err(ClinisimError::validation("diagnosis must not be empty"));
        }

        let complaint = self.chief_complaint(diagnosis, instruction).await;

        let (system, user) =
            prompt::patient_profile(diagnosis, &complaint, &catalog.names(), instruction);
        let request = ChatRequest {
            node: GENERATE_PROFILE_NODE.to_string(),
            system,
            user,
            temperature: self.temperature,
        };
        let mut profile: PatientProfile =
            invoke_structured(self.gateway.as_ref(), &request, &schemas::patient_profile()).await?;

        profile.case_metadata.chief_complaint = complaint;
        profile.saved = false;
        profile.validate()?;
        mark_catalog_presence(&mut profile, catalog);

        self.profiles.put(id, profile.clone()).await?;
        info!(
            profile_id = %id,
            case_id = %profile.case_metadata.case_id,
            symptoms = profile.symptoms.len(),
            "profile generated"
        );
        Ok(profile)
    }

    /// Replace the profile stored under `id` with a fresh one for the same
    /// diagnosis. The replacement starts unpublished.
    pub async fn regenerate(
        &self,
        id: ProfileId,
        catalog: &Catalog,
        instruction: Option<&str>,
    ) -> ClinisimResult<PatientProfile> {
        let existing = self
            .profiles
            .find_by_id(id)
            .await?
            .ok_or_else(|| ClinisimError::not_found("patient profile", id))?;
        self.generate(id, &existing.primary_diagnosis.name, catalog, instruction)
            .await
    }

    /// The chief complaint, or a generic one if the call fails.
    async fn chief_complaint(&self, diagnosis: &str, instruction: Option<&str>) -> String {
        let (system, user) = prompt::chief_complaint(diagnosis, instruction);
        let request = ChatRequest {
            node: CHIEF_COMPLAINT_NODE.to_string(),
            system,
            user,
            temperature: self.temperature,
        };
        match invoke_structured::<ChiefComplaint>(
            self.gateway.as_ref(),
            &request,
            &schemas::chief_complaint(),
        )
        .await
        {
            Ok(c) => c.chief_complaint,
            Err(e) => {
                warn!(diagnosis, error = %e, "chief complaint generation failed, using fallback");
                format!("Chief complaint related to {}", diagnosis)
            }
        }
    }
}
