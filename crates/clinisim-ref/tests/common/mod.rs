#![allow(dead_code)]

use std::sync::Arc;

use clinisim_config::EngineConfig;
use clinisim_contracts::session::{GradingMode, SessionId, ThreadId, UserId};
use clinisim_contracts::thread::ThreadState;
use clinisim_core::traits::ChatRequest;
use clinisim_ref::{sample_data::SAMPLE_PROFILE_ID, Runtime, ScriptedModel};

pub fn config(mode: GradingMode) -> EngineConfig {
    let mut config = EngineConfig {
        grading_mode: mode,
        ..EngineConfig::default()
    };
    config.limits.max_retries = 0;
    config
}

/// A runtime over `model` with the sample case stored as profile 42.
pub async fn runtime(mode: GradingMode, model: Arc<ScriptedModel>) -> Runtime {
    runtime_with(config(mode), model).await
}

pub async fn runtime_with(config: EngineConfig, model: Arc<ScriptedModel>) -> Runtime {
    let runtime = Runtime::new(&config, model).await.unwrap();
    runtime.seed_sample_profile().await.unwrap();
    runtime
}

/// Open the session for `user` on the sample case.
pub async fn session(runtime: &Runtime, user: u64) -> SessionId {
    runtime
        .sessions
        .open_session(UserId(user), SAMPLE_PROFILE_ID)
        .await
        .unwrap()
        .id
}

pub async fn thread_state(runtime: &Runtime, user: u64, session: SessionId) -> ThreadState {
    let thread = ThreadId::for_user(UserId(user), session);
    runtime
        .graph
        .checkpoints()
        .load(&thread)
        .await
        .unwrap()
        .expect("thread has a checkpoint")
}

pub fn position(requests: &[ChatRequest], pred: impl Fn(&ChatRequest) -> bool) -> Vec<usize> {
    requests
        .iter()
        .enumerate()
        .filter(|(_, r)| pred(r))
        .map(|(i, _)| i)
        .collect()
}
