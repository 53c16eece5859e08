//! Runnable demo scenarios.
//!
//! Each scenario builds its own `Runtime` over a `ScriptedModel` and walks
//! one path through the engine, printing what happens at every step.

pub mod completion;
pub mod generation;
pub mod interview;
pub mod safety;

use std::sync::Arc;

use clinisim_config::EngineConfig;
use clinisim_contracts::{error::ClinisimResult, session::GradingMode};

use crate::{runtime::Runtime, scripted::ScriptedModel};

/// A runtime in `mode` over `model`, with the sample case already stored.
pub(crate) async fn scripted_runtime(mode: GradingMode, model: ScriptedModel) -> ClinisimResult<Runtime> {
    let config = EngineConfig {
        grading_mode: mode,
        ..EngineConfig::default()
    };
    let runtime = Runtime::new(&config, Arc::new(model)).await?;
    runtime.seed_sample_profile().await?;
    Ok(runtime)
}

pub(crate) fn status(ok: bool) -> &'static str {
    if ok {
        "VERIFIED"
    } else {
        "FAILED"
    }
}
