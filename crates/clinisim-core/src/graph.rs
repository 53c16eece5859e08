//! The orchestration graph.
//!
//! Interactive pipeline:
//!
//!   LoadProfile → {7 × Analyze*} → GenerateResponse → [ScoreTurn]
//!
//! Completion pipeline:
//!
//!   LoadProfile → Grade
//!
//! Each arrow is a superstep. After every superstep the merged thread state
//! is checkpointed, so a later invocation on the same thread resumes from the
//! last committed step. The seven analyses run as concurrent tasks and must
//! all succeed before synthesis runs: the first failure aborts the rest and
//! fails the turn.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, error, info};

use clinisim_contracts::{
    analysis::{AnalysisFacet, HolisticGrade, TurnScore},
    error::{ClinisimError, ClinisimResult},
    profile::{PatientProfile, ProfileId},
    session::{ConversationTurn, GradingMode, ThreadId},
    thread::{StateUpdate, ThreadState},
};

use crate::{
    nodes::{self, Temperatures},
    traits::{CheckpointStore, ModelGateway, ProfileStore},
};

#[derive(Debug, Clone)]
pub struct GraphSettings {
    pub mode: GradingMode,
    pub temperatures: Temperatures,
    /// Dialogue messages shown to the synthesis node.
    pub transcript_window: usize,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            mode: GradingMode::default(),
            temperatures: Temperatures::default(),
            transcript_window: 12,
        }
    }
}

/// Result of one interactive run.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub reply: String,
    /// Present in incremental mode only.
    pub score: Option<TurnScore>,
    pub version: u64,
}

/// Result of one completion run.
#[derive(Debug, Clone)]
pub struct GradeOutcome {
    pub grade: HolisticGrade,
    pub version: u64,
}

pub struct OrchestrationGraph {
    gateway: Arc<dyn ModelGateway>,
    profiles: Arc<dyn ProfileStore>,
    checkpoints: Arc<dyn CheckpointStore>,
    settings: GraphSettings,
}

impl OrchestrationGraph {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        profiles: Arc<dyn ProfileStore>,
        checkpoints: Arc<dyn CheckpointStore>,
        settings: GraphSettings,
    ) -> Self {
        Self {
            gateway,
            profiles,
            checkpoints,
            settings,
        }
    }

    pub fn mode(&self) -> GradingMode {
        self.settings.mode
    }

    pub fn checkpoints(&self) -> &Arc<dyn CheckpointStore> {
        &self.checkpoints
    }

    /// Run the interactive pipeline for one clinician utterance.
    ///
    /// The caller must not run two invocations for the same thread at once.
    pub async fn run_turn(
        &self,
        thread: &ThreadId,
        profile_id: ProfileId,
        utterance: &str,
    ) -> ClinisimResult<TurnOutcome> {
        let mut state = self.restore(thread).await?;
        state.begin_turn(utterance);
        debug!(thread_id = %thread, turn = state.turn, version = state.version, "interactive run starting");

        // ── Superstep 1: LoadProfile ─────────────────────────────────────────
        let update = nodes::load_profile(self.profiles.as_ref(), profile_id).await?;
        state.apply(update);
        self.commit(&mut state, nodes::LOAD_PROFILE).await?;

        // ── Superstep 2: fan-out / fan-in ────────────────────────────────────
        let profile = loaded_profile(&state)?.clone();
        for update in self.fan_out(&profile, utterance).await? {
            state.apply(update);
        }
        let missing = state.missing_facets();
        if !missing.is_empty() {
            return Err(ClinisimError::StateMachine {
                reason: format!("fan-in barrier passed with analyses missing: {:?}", missing),
            });
        }
        self.commit(&mut state, "Analyze").await?;

        // ── Superstep 3: GenerateResponse ────────────────────────────────────
        let update = nodes::generate_response(
            self.gateway.as_ref(),
            &state,
            self.settings.transcript_window,
            self.settings.temperatures.synthesis,
        )
        .await?;
        state.apply(update);
        self.commit(&mut state, nodes::GENERATE_RESPONSE).await?;

        let reply = state
            .final_response
            .clone()
            .ok_or_else(|| ClinisimError::StateMachine {
                reason: "GenerateResponse committed without a reply".to_string(),
            })?;

        // ── Superstep 4: ScoreTurn (incremental only) ────────────────────────
        if self.settings.mode == GradingMode::Incremental {
            let update = nodes::score_turn(
                self.gateway.as_ref(),
                &profile,
                utterance,
                &reply,
                self.settings.temperatures.grading,
            )
            .await?;
            state.apply(update);
            self.commit(&mut state, nodes::SCORE_TURN).await?;
        }

        info!(thread_id = %thread, turn = state.turn, version = state.version, "interactive run complete");
        Ok(TurnOutcome {
            reply,
            score: state.last_score.clone(),
            version: state.version,
        })
    }

    /// Run the completion pipeline over the stored transcript.
    pub async fn run_completion(
        &self,
        thread: &ThreadId,
        profile_id: ProfileId,
        turns: &[ConversationTurn],
    ) -> ClinisimResult<GradeOutcome> {
        let mut state = self.restore(thread).await?;
        debug!(thread_id = %thread, turns = turns.len(), "completion run starting");

        let update = nodes::load_profile(self.profiles.as_ref(), profile_id).await?;
        state.apply(update);
        self.commit(&mut state, nodes::LOAD_PROFILE).await?;

        let profile = loaded_profile(&state)?;
        let update = nodes::grade(
            self.gateway.as_ref(),
            profile,
            turns,
            self.settings.temperatures.grading,
        )
        .await?;
        state.apply(update);
        self.commit(&mut state, nodes::GRADE).await?;

        let grade = state.grade.clone().ok_or_else(|| ClinisimError::StateMachine {
            reason: "Grade committed without a grade".to_string(),
        })?;
        Ok(GradeOutcome {
            grade,
            version: state.version,
        })
    }

    async fn restore(&self, thread: &ThreadId) -> ClinisimResult<ThreadState> {
        Ok(self
            .checkpoints
            .load(thread)
            .await?
            .unwrap_or_else(|| ThreadState::new(thread.clone())))
    }

    async fn commit(&self, state: &mut ThreadState, node: &str) -> ClinisimResult<()> {
        state.version = self.checkpoints.save(state).await?;
        debug!(thread_id = %state.thread_id, node, version = state.version, "superstep committed");
        Ok(())
    }

    /// Run all seven analyses concurrently.
    ///
    /// Updates are returned in completion order. Any failure aborts the
    /// remaining tasks.
    async fn fan_out(
        &self,
        profile: &PatientProfile,
        utterance: &str,
    ) -> ClinisimResult<Vec<StateUpdate>> {
        let mut join_set = JoinSet::new();
        for facet in AnalysisFacet::ALL {
            let gateway = self.gateway.clone();
            let slice = profile.slice(facet);
            let utterance = utterance.to_string();
            let temperature = self.settings.temperatures.analysis;
            join_set.spawn(async move {
                let result = nodes::analyze(gateway.as_ref(), slice, &utterance, temperature).await;
                (facet, result)
            });
        }

        let mut updates = Vec::with_capacity(AnalysisFacet::ALL.len());
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((_, Ok(update))) => updates.push(update),
                Ok((facet, Err(e))) => {
                    error!(facet = %facet, error = %e, "analysis node failed, aborting fan-out");
                    join_set.abort_all();
                    return Err(e);
                }
                Err(e) => {
                    error!(error = %e, "analysis task did not complete");
                    join_set.abort_all();
                    return Err(ClinisimError::StateMachine {
                        reason: format!("analysis task failed to join: {}", e),
                    });
                }
            }
        }
        Ok(updates)
    }
}

fn loaded_profile(state: &ThreadState) -> ClinisimResult<&PatientProfile> {
    state.profile.as_ref().ok_or_else(|| ClinisimError::StateMachine {
        reason: "LoadProfile committed without a profile".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clinisim_contracts::{
        session::{SessionId, UserId},
        thread::MessageRole,
    };

    use super::*;
    use crate::testing::{profile, FixedProfiles, NodeGateway, RecordingCheckpoints};

    fn thread() -> ThreadId {
        ThreadId::for_user(UserId(1), SessionId(42))
    }

    fn graph(gateway: NodeGateway, mode: GradingMode) -> (OrchestrationGraph, Arc<RecordingCheckpoints>) {
        let checkpoints = Arc::new(RecordingCheckpoints::new());
        let graph = OrchestrationGraph::new(
            Arc::new(gateway),
            Arc::new(FixedProfiles::with(ProfileId(42), profile())),
            checkpoints.clone(),
            GraphSettings {
                mode,
                ..Default::default()
            },
        );
        (graph, checkpoints)
    }

    // ── Interactive pipeline ─────────────────────────────────────────────────

    #[tokio::test]
    async fn turn_produces_reply_and_commits_each_superstep() {
        let (graph, checkpoints) = graph(NodeGateway::new(), GradingMode::Holistic);
        let outcome = graph
            .run_turn(&thread(), ProfileId(42), "Tell me about your sleep")
            .await
            .unwrap();

        assert!(!outcome.reply.is_empty());
        assert!(outcome.score.is_none());
        // LoadProfile, Analyze, GenerateResponse.
        assert_eq!(outcome.version, 3);
        assert_eq!(checkpoints.saved().len(), 3);
    }

    #[tokio::test]
    async fn all_seven_analyses_checkpointed_before_synthesis() {
        let (graph, checkpoints) = graph(NodeGateway::new(), GradingMode::Holistic);
        graph.run_turn(&thread(), ProfileId(42), "Tell me about your sleep").await.unwrap();

        let saved = checkpoints.saved();
        let barrier = &saved[1];
        assert!(barrier.missing_facets().is_empty());
        assert!(barrier.final_response.is_none());
        assert!(saved[2].final_response.is_some());
    }

    #[tokio::test]
    async fn analyses_run_concurrently() {
        // Each analysis sleeps 100ms; sequential execution would need 700ms.
        let gateway = NodeGateway::new().with_delay("Analyze", Duration::from_millis(100));
        let (graph, _) = graph(gateway, GradingMode::Holistic);
        let started = std::time::Instant::now();
        graph.run_turn(&thread(), ProfileId(42), "How is your mood?").await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(500), "took {:?}", started.elapsed());
    }

    #[tokio::test]
    async fn single_analysis_failure_fails_the_turn() {
        let gateway = NodeGateway::new().failing("AnalyzeSymptoms");
        let calls = gateway.calls();
        let (graph, checkpoints) = graph(gateway, GradingMode::Holistic);

        let result = graph.run_turn(&thread(), ProfileId(42), "Any headaches?").await;
        match result {
            Err(ClinisimError::Transport { .. }) => {}
            other => panic!("expected Transport, got {:?}", other),
        }
        assert!(!calls.lock().unwrap().iter().any(|n| n == nodes::GENERATE_RESPONSE));
        // Only LoadProfile was committed.
        assert_eq!(checkpoints.saved().len(), 1);
    }

    #[tokio::test]
    async fn unknown_profile_is_not_found() {
        let (graph, _) = graph(NodeGateway::new(), GradingMode::Holistic);
        match graph.run_turn(&thread(), ProfileId(7), "Hello").await {
            Err(ClinisimError::NotFound { entity, id }) => {
                assert_eq!(entity, "patient profile");
                assert_eq!(id, "7");
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn incremental_mode_scores_the_turn() {
        let (graph, checkpoints) = graph(NodeGateway::new(), GradingMode::Incremental);
        let outcome = graph.run_turn(&thread(), ProfileId(42), "How are you feeling?").await.unwrap();
        assert_eq!(outcome.score.unwrap().score, 15.0);
        assert_eq!(checkpoints.saved().len(), 4);
    }

    #[tokio::test]
    async fn second_turn_sees_first_turn_transcript() {
        let (graph, checkpoints) = graph(NodeGateway::new(), GradingMode::Holistic);
        graph.run_turn(&thread(), ProfileId(42), "first question").await.unwrap();
        graph.run_turn(&thread(), ProfileId(42), "second question").await.unwrap();

        let last = checkpoints.saved().pop().unwrap();
        assert_eq!(last.turn, 2);
        let dialogue: Vec<(MessageRole, &str)> = last
            .dialogue(10)
            .into_iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect();
        assert_eq!(dialogue.len(), 4);
        assert_eq!(dialogue[0], (MessageRole::Clinician, "first question"));
        assert_eq!(dialogue[2], (MessageRole::Clinician, "second question"));
    }

    #[tokio::test]
    async fn escalation_is_enforced_for_self_harm_utterance() {
        // The scripted risk critique has no escalation language.
        let (graph, checkpoints) = graph(NodeGateway::new(), GradingMode::Holistic);
        graph
            .run_turn(&thread(), ProfileId(42), "Have you thought about killing yourself?")
            .await
            .unwrap();
        let last = checkpoints.saved().pop().unwrap();
        let risk = &last.analyses[&AnalysisFacet::Risk];
        assert!(crate::safety::contains_escalation(&risk.critique));
    }

    #[tokio::test]
    async fn escalation_covers_common_risk_phrasings() {
        let neutral = serde_json::json!({ "critique": "No concerns raised.", "notes_for_context": null });
        let cases = [
            ("Have you been cutting yourself?", "No concerns raised."),
            ("Do you ever feel you'd be better off dead?", "No concerns raised."),
            ("Have you thought about taking your own life?", "No concerns raised."),
            ("Any thoughts of harming others?", "No concerns raised."),
            ("How are you feeling?", "Patient has a passive death wish per profile."),
        ];
        for (utterance, critique) in cases {
            let mut answer = neutral.clone();
            answer["critique"] = serde_json::Value::from(critique);
            let gateway = NodeGateway::new().answer(AnalysisFacet::Risk.node_name(), answer);
            let (graph, checkpoints) = graph(gateway, GradingMode::Holistic);

            graph.run_turn(&thread(), ProfileId(42), utterance).await.unwrap();

            let last = checkpoints.saved().pop().unwrap();
            let risk = &last.analyses[&AnalysisFacet::Risk].critique;
            assert!(
                risk.ends_with(crate::safety::ESCALATION_NOTICE),
                "no escalation for {:?}: {}",
                utterance,
                risk
            );
        }
    }

    #[tokio::test]
    async fn unprompted_disclosure_escalates_only_for_an_at_risk_profile() {
        const DISCLOSURE: &str = "Some days I think my family would be better off without me.";

        let gateway = NodeGateway::new().reply_with(DISCLOSURE);
        let (graph, checkpoints) = graph(gateway, GradingMode::Holistic);
        graph.run_turn(&thread(), ProfileId(42), "How are things at home?").await.unwrap();
        let last = checkpoints.saved().pop().unwrap();
        assert!(last.analyses[&AnalysisFacet::Risk]
            .critique
            .ends_with(crate::safety::ESCALATION_NOTICE));

        let mut calm = profile();
        calm.risk_assessment.suicide_risk.passive_death_wish = false;
        let checkpoints = Arc::new(RecordingCheckpoints::new());
        let graph = OrchestrationGraph::new(
            Arc::new(NodeGateway::new().reply_with(DISCLOSURE)),
            Arc::new(FixedProfiles::with(ProfileId(42), calm)),
            checkpoints.clone(),
            GraphSettings::default(),
        );
        graph.run_turn(&thread(), ProfileId(42), "How are things at home?").await.unwrap();
        let last = checkpoints.saved().pop().unwrap();
        assert!(!last.analyses[&AnalysisFacet::Risk]
            .critique
            .contains(crate::safety::ESCALATION_NOTICE));
    }

    #[tokio::test]
    async fn unsafe_reply_is_a_safety_violation() {
        let gateway = NodeGateway::new().reply_with("You could take 30 of my sleeping pills, that works.");
        let (graph, _) = graph(gateway, GradingMode::Holistic);
        match graph.run_turn(&thread(), ProfileId(42), "What would you do?").await {
            Err(ClinisimError::SafetyViolation { .. }) => {}
            other => panic!("expected SafetyViolation, got {:?}", other),
        }
    }

    // ── Completion pipeline ──────────────────────────────────────────────────

    #[tokio::test]
    async fn completion_grades_transcript() {
        let (graph, _) = graph(NodeGateway::new(), GradingMode::Holistic);
        let outcome = graph.run_completion(&thread(), ProfileId(42), &[]).await.unwrap();
        assert_eq!(outcome.grade.grade, 78.0);
        assert_eq!(outcome.version, 2);
    }

    #[tokio::test]
    async fn file_store_resumes_thread_across_graph_instances() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn CheckpointStore> =
            Arc::new(crate::checkpoint::FileCheckpointStore::open(dir.path()).await.unwrap());
        let make = || {
            OrchestrationGraph::new(
                Arc::new(NodeGateway::new()),
                Arc::new(FixedProfiles::with(ProfileId(42), profile())),
                store.clone(),
                GraphSettings::default(),
            )
        };
        make().run_turn(&thread(), ProfileId(42), "first").await.unwrap();
        let outcome = make().run_turn(&thread(), ProfileId(42), "second").await.unwrap();
        // Three supersteps per turn, continuing from the stored version.
        assert_eq!(outcome.version, 6);
    }
}
