//! Checkpoint stores for per-thread graph state.
//!
//! Both stores key state by the rendered `ThreadId` and enforce the version
//! check described on `CheckpointStore::save`.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Mutex,
};

use async_trait::async_trait;
use tracing::debug;

use clinisim_contracts::{
    error::{ClinisimError, ClinisimResult},
    session::ThreadId,
    thread::ThreadState,
};

use crate::traits::CheckpointStore;

fn version_conflict(thread: &ThreadId, stored: u64, expected: u64) -> ClinisimError {
    ClinisimError::Checkpoint {
        reason: format!(
            "thread {} is at version {} but the save was based on version {}",
            thread, stored, expected
        ),
    }
}

// ── In-memory ────────────────────────────────────────────────────────────────

/// Process-local store. State is lost on restart.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    threads: Mutex<HashMap<String, ThreadState>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> ClinisimResult<std::sync::MutexGuard<'_, HashMap<String, ThreadState>>> {
        self.threads.lock().map_err(|e| ClinisimError::Checkpoint {
            reason: format!("checkpoint lock poisoned: {}", e),
        })
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self, thread: &ThreadId) -> ClinisimResult<Option<ThreadState>> {
        Ok(self.lock()?.get(&thread.to_string()).cloned())
    }

    async fn save(&self, state: &ThreadState) -> ClinisimResult<u64> {
        let mut threads = self.lock()?;
        let key = state.thread_id.to_string();
        let stored = threads.get(&key).map(|s| s.version).unwrap_or(0);
        if stored != state.version {
            return Err(version_conflict(&state.thread_id, stored, state.version));
        }
        let mut next = state.clone();
        next.version = stored + 1;
        let version = next.version;
        threads.insert(key, next);
        debug!(thread_id = %state.thread_id, version, "checkpoint saved");
        Ok(version)
    }

    async fn delete(&self, thread: &ThreadId) -> ClinisimResult<()> {
        self.lock()?.remove(&thread.to_string());
        Ok(())
    }
}

// ── File-backed ──────────────────────────────────────────────────────────────

/// One JSON document per thread under `directory`.
///
/// Writes go to a uniquely named temporary file that is then renamed over
/// the target, so a crash never leaves a half-written checkpoint.
pub struct FileCheckpointStore {
    directory: PathBuf,
}

impl FileCheckpointStore {
    /// Create the store, creating `directory` if needed.
    pub async fn open(directory: impl AsRef<Path>) -> ClinisimResult<Self> {
        let directory = directory.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(|e| ClinisimError::Checkpoint {
                reason: format!("cannot create {}: {}", directory.display(), e),
            })?;
        Ok(Self { directory })
    }

    fn path_for(&self, thread: &ThreadId) -> PathBuf {
        self.directory.join(format!("{}.json", thread))
    }

    async fn read(&self, path: &Path) -> ClinisimResult<Option<ThreadState>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| ClinisimError::Checkpoint {
                    reason: format!("corrupt checkpoint {}: {}", path.display(), e),
                }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ClinisimError::Checkpoint {
                reason: format!("cannot read {}: {}", path.display(), e),
            }),
        }
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self, thread: &ThreadId) -> ClinisimResult<Option<ThreadState>> {
        self.read(&self.path_for(thread)).await
    }

    async fn save(&self, state: &ThreadState) -> ClinisimResult<u64> {
        let path = self.path_for(&state.thread_id);
        let stored = self.read(&path).await?.map(|s| s.version).unwrap_or(0);
        if stored != state.version {
            return Err(version_conflict(&state.thread_id, stored, state.version));
        }

        let mut next = state.clone();
        next.version = stored + 1;
        let bytes = serde_json::to_vec_pretty(&next).map_err(|e| ClinisimError::Checkpoint {
            reason: format!("cannot serialize thread {}: {}", state.thread_id, e),
        })?;

        let tmp = self
            .directory
            .join(format!(".{}.{}.tmp", state.thread_id, uuid::Uuid::new_v4()));
        let io_err = |e: std::io::Error| ClinisimError::Checkpoint {
            reason: format!("cannot write checkpoint {}: {}", path.display(), e),
        };
        tokio::fs::write(&tmp, &bytes).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_err)?;

        debug!(thread_id = %state.thread_id, version = next.version, path = %path.display(), "checkpoint written");
        Ok(next.version)
    }

    async fn delete(&self, thread: &ThreadId) -> ClinisimResult<()> {
        match tokio::fs::remove_file(self.path_for(thread)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ClinisimError::Checkpoint {
                reason: format!("cannot delete checkpoint for {}: {}", thread, e),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use clinisim_contracts::{
        session::{SessionId, UserId},
        thread::GraphMessage,
    };

    use super::*;

    fn state() -> ThreadState {
        let mut s = ThreadState::new(ThreadId::for_user(UserId(1), SessionId(42)));
        s.begin_turn("Tell me about your sleep");
        s
    }

    async fn exercise(store: &dyn CheckpointStore) {
        let mut s = state();
        assert!(store.load(&s.thread_id).await.unwrap().is_none());

        s.version = store.save(&s).await.unwrap();
        assert_eq!(s.version, 1);

        s.messages.push(GraphMessage::patient("Not well."));
        s.version = store.save(&s).await.unwrap();
        assert_eq!(s.version, 2);

        let loaded = store.load(&s.thread_id).await.unwrap().unwrap();
        assert_eq!(loaded.version, 2);
        assert_eq!(loaded.messages.len(), 2);
        assert_eq!(loaded.turn, 1);
    }

    async fn exercise_conflict(store: &dyn CheckpointStore) {
        let s = state();
        store.save(&s).await.unwrap();
        // A second writer still holding version 0.
        match store.save(&s).await {
            Err(ClinisimError::Checkpoint { reason }) => assert!(reason.contains("version")),
            other => panic!("expected Checkpoint, got {:?}", other),
        }
    }

    // ── In-memory ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn memory_save_load_bumps_version() {
        exercise(&InMemoryCheckpointStore::new()).await;
    }

    #[tokio::test]
    async fn memory_stale_save_is_rejected() {
        exercise_conflict(&InMemoryCheckpointStore::new()).await;
    }

    #[tokio::test]
    async fn memory_delete_forgets_thread() {
        let store = InMemoryCheckpointStore::new();
        let s = state();
        store.save(&s).await.unwrap();
        store.delete(&s.thread_id).await.unwrap();
        assert!(store.load(&s.thread_id).await.unwrap().is_none());
    }

    // ── File ─────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn file_save_load_bumps_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::open(dir.path()).await.unwrap();
        exercise(&store).await;
        assert!(dir.path().join("1-42.json").exists());
    }

    #[tokio::test]
    async fn file_stale_save_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::open(dir.path()).await.unwrap();
        exercise_conflict(&store).await;
    }

    #[tokio::test]
    async fn file_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let s = state();
        {
            let store = FileCheckpointStore::open(dir.path()).await.unwrap();
            store.save(&s).await.unwrap();
        }
        let store = FileCheckpointStore::open(dir.path()).await.unwrap();
        let loaded = store.load(&s.thread_id).await.unwrap().unwrap();
        assert_eq!(loaded.clinician_utterance.as_deref(), Some("Tell me about your sleep"));
    }

    #[tokio::test]
    async fn file_corrupt_checkpoint_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1-42.json"), b"{not json").unwrap();
        let store = FileCheckpointStore::open(dir.path()).await.unwrap();
        let thread = ThreadId::for_user(UserId(1), SessionId(42));
        assert!(matches!(store.load(&thread).await, Err(ClinisimError::Checkpoint { .. })));
    }
}
