//! Configuration schema.
//!
//! Every section and field has a default, so an empty document is a valid
//! configuration.
//!
//! ```toml
//! grading_mode = "incremental"
//!
//! [model]
//! name = "gpt-4o-mini"
//!
//! [limits]
//! call_timeout_ms = 30000
//! ```

use clinisim_contracts::session::GradingMode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    /// OpenAI-compatible endpoint root, without `/chat/completions`.
    pub base_url: String,
    /// Environment variable holding the API key. The key itself is never
    /// stored in configuration.
    pub api_key_env: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "gpt-4o".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemperatureConfig {
    pub analysis: f32,
    pub synthesis: f32,
    pub grading: f32,
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        Self {
            analysis: 0.2,
            synthesis: 0.8,
            grading: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub call_timeout_ms: u64,
    /// Retries after the first attempt of a model call.
    pub max_retries: u32,
    pub max_utterance_chars: usize,
    /// Dialogue messages shown to the response synthesizer.
    pub transcript_window: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: 60_000,
            max_retries: 2,
            max_utterance_chars: 4000,
            transcript_window: 12,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Directory for file-backed thread checkpoints. Empty keeps them in memory.
    pub directory: String,
}

/// The top-level structure deserialized from a TOML engine file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub grading_mode: GradingMode,
    pub model: ModelConfig,
    pub temperatures: TemperatureConfig,
    pub limits: LimitsConfig,
    pub checkpoint: CheckpointConfig,
}
