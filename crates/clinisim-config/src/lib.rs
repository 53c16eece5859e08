//! # clinisim-config
//!
//! TOML-driven configuration for the clinisim grading engine.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use clinisim_config::EngineConfig;
//!
//! let mut config = EngineConfig::from_file(Path::new("clinisim.toml"))?;
//! config.apply_env_overrides()?;
//! config.validate()?;
//!
//! let graph = OrchestrationGraph::new(gateway, profiles, checkpoints, config.graph_settings());
//! ```

pub mod loader;
pub mod settings;

pub use loader::{ENV_CALL_TIMEOUT_MS, ENV_GRADING_MODE, ENV_MODEL};
pub use settings::{CheckpointConfig, EngineConfig, LimitsConfig, ModelConfig, TemperatureConfig};

// ── Tests ─────────────────────────────────────────────────────────────────────
