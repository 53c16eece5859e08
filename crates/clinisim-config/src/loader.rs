//! Loading, overriding, and validating an `EngineConfig`, and turning it
//! into the settings each engine component takes.
//!
//! Order of precedence: built-in defaults, then the TOML document, then
//! `CLINISIM_*` environment variables. `validate` runs last.

use std::{path::Path, path::PathBuf, time::Duration};

use tracing::{debug, info};

use clinisim_contracts::error::{ClinisimError, ClinisimResult};
use clinisim_core::{
    nodes::Temperatures, GatewaySettings, GraphSettings, SessionSettings,
};

use crate::settings::EngineConfig;

pub const ENV_GRADING_MODE: &str = "CLINISIM_GRADING_MODE";
pub const ENV_MODEL: &str = "CLINISIM_MODEL";
pub const ENV_CALL_TIMEOUT_MS: &str = "CLINISIM_CALL_TIMEOUT_MS";

/// Grading must be near-deterministic.
pub const MAX_GRADING_TEMPERATURE: f32 = 0.3;

fn config_error(reason: impl Into<String>) -> ClinisimError {
    ClinisimError::Config {
        reason: reason.into(),
    }
}

impl EngineConfig {
    /// Parse `s` as TOML. Missing sections and fields take their defaults.
    ///
    /// Returns `ClinisimError::Config` if the TOML is malformed or a value
    /// has the wrong type.
    pub fn from_toml_str(s: &str) -> ClinisimResult<Self> {
        toml::from_str(s).map_err(|e| config_error(format!("failed to parse engine TOML: {}", e)))
    }

    /// Read the file at `path` and parse it as TOML engine configuration.
    pub fn from_file(path: &Path) -> ClinisimResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            config_error(format!("failed to read config file '{}': {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&contents)?;
        info!(path = %path.display(), mode = ?config.grading_mode, "engine configuration loaded");
        Ok(config)
    }

    /// Apply `CLINISIM_GRADING_MODE`, `CLINISIM_MODEL`, and
    /// `CLINISIM_CALL_TIMEOUT_MS` from the process environment.
    pub fn apply_env_overrides(&mut self) -> ClinisimResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ClinisimResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = lookup(ENV_GRADING_MODE) {
            self.grading_mode = mode
                .parse()
                .map_err(|e| config_error(format!("{}: {}", ENV_GRADING_MODE, e)))?;
            debug!(mode = ?self.grading_mode, "grading mode overridden from environment");
        }
        if let Some(model) = lookup(ENV_MODEL) {
            if !model.trim().is_empty() {
                self.model.name = model.trim().to_string();
                debug!(model = %self.model.name, "model overridden from environment");
            }
        }
        if let Some(timeout) = lookup(ENV_CALL_TIMEOUT_MS) {
            self.limits.call_timeout_ms = timeout.trim().parse().map_err(|_| {
                config_error(format!(
                    "{} must be a whole number of milliseconds, got '{}'",
                    ENV_CALL_TIMEOUT_MS, timeout
                ))
            })?;
        }
        Ok(())
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> ClinisimResult<()> {
        let t = &self.temperatures;
        for (name, value) in [
            ("analysis", t.analysis),
            ("synthesis", t.synthesis),
            ("grading", t.grading),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(config_error(format!(
                    "temperatures.{} = {} is outside [0, 2]",
                    name, value
                )));
            }
        }
        if t.grading > MAX_GRADING_TEMPERATURE {
            return Err(config_error(format!(
                "temperatures.grading = {} exceeds {}",
                t.grading, MAX_GRADING_TEMPERATURE
            )));
        }
        if self.limits.call_timeout_ms == 0 {
            return Err(config_error("limits.call_timeout_ms must be greater than 0"));
        }
        if self.limits.transcript_window == 0 {
            return Err(config_error("limits.transcript_window must be greater than 0"));
        }
        if self.limits.max_utterance_chars == 0 {
            return Err(config_error("limits.max_utterance_chars must be greater than 0"));
        }
        if self.model.name.trim().is_empty() {
            return Err(config_error("model.name must not be empty"));
        }
        Ok(())
    }

    // ── Component settings ────────────────────────────────────────────────────

    pub fn temperatures(&self) -> Temperatures {
        Temperatures {
            analysis: self.temperatures.analysis,
            synthesis: self.temperatures.synthesis,
            grading: self.temperatures.grading,
        }
    }

    pub fn gateway_settings(&self) -> GatewaySettings {
        GatewaySettings {
            call_timeout: Duration::from_millis(self.limits.call_timeout_ms),
            max_retries: self.limits.max_retries,
            ..GatewaySettings::default()
        }
    }

    pub fn graph_settings(&self) -> GraphSettings {
        GraphSettings {
            mode: self.grading_mode,
            temperatures: self.temperatures(),
            transcript_window: self.limits.transcript_window,
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            max_utterance_chars: self.limits.max_utterance_chars,
        }
    }

    /// `None` when checkpoints stay in memory.
    pub fn checkpoint_dir(&self) -> Option<PathBuf> {
        let dir = self.checkpoint.directory.trim();
        (!dir.is_empty()).then(|| PathBuf::from(dir))
    }
}
