//! # clinisim-ledger
//!
//! Process-local persistence for the clinisim engine: patient profiles,
//! grading sessions, and an append-only, SHA-256 hash-chained transcript per
//! session.
//!
//! ## Overview
//!
//! Every stored turn is wrapped in a `ChainedTurn` that links to the previous
//! turn of the same session via its hash. Editing any stored turn, even one
//! byte of its content, breaks the chain and is detected by `verify_chain`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use clinisim_ledger::InMemoryLedger;
//! use clinisim_core::traits::ConversationLedger;
//!
//! let ledger = InMemoryLedger::new();
//! let session = ledger.find_or_create_session(user, profile).await?;
//! ledger.append_turn(session.id, NewTurn::clinician("How have you been sleeping?")).await?;
//!
//! assert!(ledger.verify_integrity(session.id)?);
//! let export = ledger.export_transcript(session.id)?;
//! ```

pub mod chain;
pub mod event;
pub mod memory;

pub use chain::{hash_turn, verify_chain};
pub use event::{ChainedTurn, TranscriptExport};
pub use memory::InMemoryLedger;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use clinisim_contracts::{
        error::ClinisimError,
        profile::{PatientProfile, ProfileId},
        session::{NewTurn, SessionId, SessionUpdate, UserId},
    };
    use clinisim_core::traits::{ConversationLedger, ProfileStore};

    use super::{ChainedTurn, InMemoryLedger};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn profile(case_id: &str) -> PatientProfile {
        serde_json::from_value(json!({
            "schema_version": "1.0",
            "case_metadata": {
                "case_id": case_id, "difficulty": "easy",
                "setting": "outpatient", "chief_complaint": "I feel on edge"
            },
            "primary_diagnosis": {
                "dx_id": 1, "name": "Generalized anxiety disorder", "code": "F41.1",
                "confidence": "moderate", "rationale": "worry most days for a year"
            },
            "risk_assessment": {
                "suicide_risk": {
                    "passive_death_wish": false, "active_ideation": false,
                    "plan": false, "intent": false
                },
                "homicide_risk": false
            },
            "mental_status": {
                "speech": "rapid", "mood": "anxious", "affect": "tense",
                "thought_process": "linear", "thought_content": "worry",
                "perception": "normal", "cognition": "intact",
                "insight": "good", "judgment": "good"
            },
            "interaction_style": {
                "verbosity": "high", "affect_style": "restless", "trust_baseline": "open"
            }
        }))
        .unwrap()
    }

    /// A ledger holding profile 42 and one open session for user 1.
    async fn seeded() -> (InMemoryLedger, SessionId) {
        let ledger = InMemoryLedger::new();
        ledger.put(ProfileId(42), profile("case-gad-42")).await.unwrap();
        let session = ledger
            .find_or_create_session(UserId(1), ProfileId(42))
            .await
            .unwrap();
        (ledger, session.id)
    }

    async fn append_three(ledger: &InMemoryLedger, session: SessionId) {
        ledger
            .append_turn(session, NewTurn::clinician("What brings you in?"))
            .await
            .unwrap();
        ledger
            .append_turn(session, NewTurn::patient("I can't stop worrying.").with_score(5.0))
            .await
            .unwrap();
        ledger
            .append_turn(session, NewTurn::clinician("How long has that been going on?"))
            .await
            .unwrap();
    }

    // ── Hash chain ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_hash_chain_integrity() {
        let (ledger, session) = seeded().await;
        append_three(&ledger, session).await;
        assert!(
            ledger.verify_integrity(session).unwrap(),
            "chain must be valid after sequential appends"
        );
    }

    #[tokio::test]
    async fn test_tamper_detection() {
        let (ledger, session) = seeded().await;
        append_three(&ledger, session).await;

        {
            let mut state = ledger.state.lock().unwrap();
            let chain = state.chains.get_mut(&session).unwrap();
            chain[0].turn.content = "TAMPERED".to_string();
        }

        assert!(
            !ledger.verify_integrity(session).unwrap(),
            "chain must detect an edited turn"
        );
    }

    #[tokio::test]
    async fn test_score_tamper_detection() {
        let (ledger, session) = seeded().await;
        append_three(&ledger, session).await;

        {
            let mut state = ledger.state.lock().unwrap();
            state.chains.get_mut(&session).unwrap()[1].turn.score = Some(50.0);
        }

        assert!(!ledger.verify_integrity(session).unwrap());
    }

    #[tokio::test]
    async fn test_genesis_hash() {
        let (ledger, session) = seeded().await;
        ledger
            .append_turn(session, NewTurn::clinician("Hello"))
            .await
            .unwrap();

        let export = ledger.export_transcript(session).unwrap();
        assert_eq!(export.entries.len(), 1);
        assert_eq!(export.entries[0].prev_hash, ChainedTurn::GENESIS_HASH);
    }

    #[tokio::test]
    async fn test_sequence_is_per_session() {
        let (ledger, first) = seeded().await;
        let second = ledger
            .find_or_create_session(UserId(2), ProfileId(42))
            .await
            .unwrap()
            .id;

        append_three(&ledger, first).await;
        ledger
            .append_turn(second, NewTurn::clinician("Hi"))
            .await
            .unwrap();

        let export = ledger.export_transcript(first).unwrap();
        for (idx, entry) in export.entries.iter().enumerate() {
            assert_eq!(entry.sequence, idx as u64);
        }
        let other = ledger.export_transcript(second).unwrap();
        assert_eq!(other.entries[0].sequence, 0);
        assert_eq!(other.entries[0].prev_hash, ChainedTurn::GENESIS_HASH);
    }

    #[tokio::test]
    async fn test_export_transcript() {
        let (ledger, session) = seeded().await;
        append_three(&ledger, session).await;

        let export = ledger.export_transcript(session).unwrap();
        assert_eq!(export.session_id, session);
        assert_eq!(export.entries.len(), 3);
        assert_eq!(export.terminal_hash, export.entries.last().unwrap().this_hash);
        assert!(super::verify_chain(&export.entries));
    }

    #[tokio::test]
    async fn test_verify_empty() {
        let (ledger, session) = seeded().await;
        assert!(ledger.verify_integrity(session).unwrap());
        assert!(super::verify_chain(&[]));
        assert_eq!(ledger.export_transcript(session).unwrap().terminal_hash, "");
    }

    // ── Relational rules ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn turns_listed_in_insertion_order_with_increasing_ids() {
        let (ledger, session) = seeded().await;
        append_three(&ledger, session).await;

        let turns = ledger.list_turns(session).await.unwrap();
        let agents: Vec<bool> = turns.iter().map(|t| t.agent).collect();
        assert_eq!(agents, vec![false, true, false]);
        assert!(turns.windows(2).all(|w| w[0].id.0 < w[1].id.0));
        assert_eq!(turns[1].score, Some(5.0));
    }

    #[tokio::test]
    async fn find_or_create_returns_existing_pair() {
        let (ledger, session) = seeded().await;
        let again = ledger
            .find_or_create_session(UserId(1), ProfileId(42))
            .await
            .unwrap();
        assert_eq!(again.id, session);
        assert_eq!(ledger.sessions_for_user(UserId(1)).await.unwrap().len(), 1);
    }

    #[test]
    fn create_session_rejects_duplicate_pair() {
        let ledger = InMemoryLedger::new();
        ledger.state.lock().unwrap().profiles.insert(ProfileId(42), profile("case-gad-42"));

        ledger.create_session(UserId(1), ProfileId(42)).unwrap();
        match ledger.create_session(UserId(1), ProfileId(42)) {
            Err(ClinisimError::DuplicateSession { user_id, profile_id }) => {
                assert_eq!((user_id, profile_id), (1, 42))
            }
            other => panic!("expected DuplicateSession, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn session_requires_existing_profile() {
        let ledger = InMemoryLedger::new();
        match ledger.find_or_create_session(UserId(1), ProfileId(9)).await {
            Err(ClinisimError::NotFound { entity, id }) => {
                assert_eq!(entity, "patient profile");
                assert_eq!(id, "9");
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn put_rejects_invalid_profile() {
        let ledger = InMemoryLedger::new();
        let mut bad = profile("case-gad-42");
        bad.case_metadata.case_id.clear();
        assert!(matches!(
            ledger.put(ProfileId(1), bad).await,
            Err(ClinisimError::Validation { .. })
        ));
        assert!(ledger.find_by_id(ProfileId(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn append_to_unknown_session_is_not_found() {
        let ledger = InMemoryLedger::new();
        assert!(matches!(
            ledger.append_turn(SessionId(5), NewTurn::clinician("hi")).await,
            Err(ClinisimError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn completed_session_is_read_only() {
        let (ledger, session) = seeded().await;
        append_three(&ledger, session).await;
        ledger
            .update_session(
                session,
                SessionUpdate {
                    total_score: Some(81.0),
                    is_completed: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        match ledger.append_turn(session, NewTurn::clinician("one more")).await {
            Err(ClinisimError::SessionCompleted { session_id }) => assert_eq!(session_id, session.0),
            other => panic!("expected SessionCompleted, got {:?}", other),
        }
        assert!(matches!(
            ledger
                .update_session(session, SessionUpdate { total_score: Some(0.0), ..Default::default() })
                .await,
            Err(ClinisimError::SessionCompleted { .. })
        ));

        let stored = ledger.get_session(session).await.unwrap().unwrap();
        assert_eq!(stored.total_score, 81.0);
        assert!(stored.is_completed);
        assert_eq!(ledger.list_turns(session).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn partial_update_leaves_other_fields() {
        let (ledger, session) = seeded().await;
        let updated = ledger
            .update_session(session, SessionUpdate { total_score: Some(12.5), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(updated.total_score, 12.5);
        assert!(!updated.is_completed);
        assert!(updated.agent_remarks.is_none());
    }

    #[tokio::test]
    async fn delete_profile_cascades_to_sessions_and_turns() {
        let (ledger, session) = seeded().await;
        append_three(&ledger, session).await;
        ledger.put(ProfileId(7), profile("case-gad-7")).await.unwrap();
        let kept = ledger
            .find_or_create_session(UserId(1), ProfileId(7))
            .await
            .unwrap();

        let removed = ledger.delete_profile(ProfileId(42)).unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, session);

        assert!(ledger.find_by_id(ProfileId(42)).await.unwrap().is_none());
        assert!(ledger.get_session(session).await.unwrap().is_none());
        assert!(matches!(
            ledger.list_turns(session).await,
            Err(ClinisimError::NotFound { .. })
        ));
        let remaining = ledger.sessions_for_user(UserId(1)).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, kept.id);
    }

    #[tokio::test]
    async fn delete_user_cascades_and_frees_the_pair() {
        let (ledger, session) = seeded().await;
        append_three(&ledger, session).await;

        assert_eq!(ledger.delete_user(UserId(1)).unwrap().len(), 1);
        assert!(ledger.sessions_for_user(UserId(1)).await.unwrap().is_empty());

        let fresh = ledger
            .find_or_create_session(UserId(1), ProfileId(42))
            .await
            .unwrap();
        assert_ne!(fresh.id, session);
        assert!(ledger.list_turns(fresh.id).await.unwrap().is_empty());
    }
}
