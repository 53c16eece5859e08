//! Wires one engine instance from an `EngineConfig` and a `ChatModel`.
//!
//! Profiles and sessions live in an `InMemoryLedger`. Checkpoints go to disk
//! when `checkpoint.directory` is set, otherwise they stay in memory.

use std::sync::Arc;

use tracing::info;

use clinisim_config::EngineConfig;
use clinisim_contracts::{
    error::ClinisimResult,
    profile::{PatientProfile, ProfileId},
    session::UserId,
};
use clinisim_core::{
    checkpoint::{FileCheckpointStore, InMemoryCheckpointStore},
    generator::ProfileGenerator,
    traits::{ChatModel, CheckpointStore, ProfileStore},
    OrchestrationGraph, SessionService, StructuredGateway,
};
use clinisim_ledger::InMemoryLedger;
use clinisim_verify::SchemaVerifier;

use crate::sample_data::{sample_profile, SAMPLE_PROFILE_ID};

pub struct Runtime {
    /// Kept concrete for integrity checks and exports.
    pub ledger: InMemoryLedger,
    pub graph: Arc<OrchestrationGraph>,
    pub sessions: SessionService,
    pub generator: ProfileGenerator,
}

impl Runtime {
    /// Validate `config` and build every component on top of `model`.
    pub async fn new(config: &EngineConfig, model: Arc<dyn ChatModel>) -> ClinisimResult<Self> {
        config.validate()?;

        let ledger = InMemoryLedger::new();
        let verifier = Arc::new(SchemaVerifier::clinical());
        let gateway = Arc::new(StructuredGateway::new(
            Arc::clone(&model),
            verifier,
            config.gateway_settings(),
        ));

        let checkpoints: Arc<dyn CheckpointStore> = match config.checkpoint_dir() {
            Some(dir) => Arc::new(FileCheckpointStore::open(dir).await?),
            None => Arc::new(InMemoryCheckpointStore::new()),
        };

        let profiles: Arc<dyn ProfileStore> = Arc::new(ledger.clone());
        let graph = Arc::new(OrchestrationGraph::new(
            gateway.clone(),
            Arc::clone(&profiles),
            checkpoints,
            config.graph_settings(),
        ));
        let sessions = SessionService::new(
            Arc::new(ledger.clone()),
            Arc::clone(&graph),
            config.session_settings(),
        );
        let generator = ProfileGenerator::new(gateway, profiles, config.temperatures.synthesis);

        info!(
            model = model.model_name(),
            mode = ?config.grading_mode,
            durable_checkpoints = config.checkpoint_dir().is_some(),
            "runtime ready"
        );
        Ok(Self {
            ledger,
            graph,
            sessions,
            generator,
        })
    }

    /// Store the sample case under `SAMPLE_PROFILE_ID`.
    pub async fn seed_sample_profile(&self) -> ClinisimResult<PatientProfile> {
        let profile = sample_profile()?;
        self.ledger.put(SAMPLE_PROFILE_ID, profile.clone()).await?;
        Ok(profile)
    }

    /// Delete a profile with its sessions, turns and thread checkpoints.
    /// Returns the number of sessions removed.
    pub async fn delete_profile(&self, id: ProfileId) -> ClinisimResult<usize> {
        let removed = self.ledger.delete_profile(id)?;
        self.sessions.discard_threads(&removed).await?;
        Ok(removed.len())
    }

    /// Delete every session a user owns, with its thread checkpoints.
    pub async fn delete_user(&self, user: UserId) -> ClinisimResult<usize> {
        let removed = self.ledger.delete_user(user)?;
        self.sessions.discard_threads(&removed).await?;
        Ok(removed.len())
    }
}
