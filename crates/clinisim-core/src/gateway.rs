//! The model gateway: declared output contracts over an untrusted model.
//!
//! Each call goes through four gates in order:
//!
//!   ChatModel::complete (under timeout) → JSON parse → Verifier → typed value
//!
//! Transient failures (`Transport { retryable: true }`, `Timeout`) are retried
//! with exponential backoff up to `max_retries`. A parse or verification
//! failure is a `SchemaViolation` and is returned immediately.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

use clinisim_contracts::{
    error::{ClinisimError, ClinisimResult},
    verify::OutputSchema,
};

use crate::traits::{ChatModel, ChatRequest, ModelGateway, Verifier};

/// Timeout and retry budget for gateway calls.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub call_timeout: Duration,
    /// Retries after the first attempt. 0 disables retry.
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(60),
            max_retries: 2,
            backoff_base: Duration::from_secs(1),
        }
    }
}

/// `ModelGateway` backed by a `ChatModel` and a `Verifier`.
pub struct StructuredGateway {
    model: Arc<dyn ChatModel>,
    verifier: Arc<dyn Verifier>,
    settings: GatewaySettings,
}

impl StructuredGateway {
    pub fn new(
        model: Arc<dyn ChatModel>,
        verifier: Arc<dyn Verifier>,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            model,
            verifier,
            settings,
        }
    }

    async fn attempt(&self, request: &ChatRequest, shape: &OutputSchema) -> ClinisimResult<Value> {
        let timeout = self.settings.call_timeout;
        let raw = match tokio::time::timeout(timeout, self.model.complete(request)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ClinisimError::Timeout {
                    node: request.node.clone(),
                    after_ms: timeout.as_millis() as u64,
                })
            }
        };

        let value = parse_json_output(&raw).map_err(|reason| {
            error!(
                node = %request.node,
                contract = %shape.schema_id,
                %reason,
                "model output is not JSON"
            );
            ClinisimError::SchemaViolation {
                contract: shape.schema_id.clone(),
                reason,
            }
        })?;

        let report = self.verifier.verify(&value, shape)?;
        if !report.passed {
            let reason = report.summary();
            error!(
                node = %request.node,
                contract = %shape.schema_id,
                %reason,
                "model output violated its contract"
            );
            return Err(ClinisimError::SchemaViolation {
                contract: shape.schema_id.clone(),
                reason,
            });
        }
        Ok(value)
    }
}

#[async_trait]
impl ModelGateway for StructuredGateway {
    async fn invoke(&self, request: &ChatRequest, shape: &OutputSchema) -> ClinisimResult<Value> {
        let mut attempt: u32 = 0;
        loop {
            debug!(node = %request.node, contract = %shape.schema_id, attempt, "model call");
            match self.attempt(request, shape).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.settings.max_retries => {
                    let delay = retry_backoff_delay(self.settings.backoff_base, attempt);
                    warn!(
                        node = %request.node,
                        attempt = attempt + 1,
                        max_retries = self.settings.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "model call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Invoke `gateway` and deserialize the verified JSON into `T`.
///
/// A deserialization failure after verification passed still means the
/// contract and the type disagree, so it is reported as `SchemaViolation`.
pub async fn invoke_structured<T: DeserializeOwned>(
    gateway: &dyn ModelGateway,
    request: &ChatRequest,
    shape: &OutputSchema,
) -> ClinisimResult<T> {
    let value = gateway.invoke(request, shape).await?;
    serde_json::from_value(value).map_err(|e| ClinisimError::SchemaViolation {
        contract: shape.schema_id.clone(),
        reason: e.to_string(),
    })
}

/// `base * 2^attempt` with ±25% jitter.
pub fn retry_backoff_delay(base: Duration, attempt: u32) -> Duration {
    let base_ms = (base.as_millis() as u64).saturating_mul(2u64.saturating_pow(attempt));
    let jitter_range = base_ms / 4;
    let jitter = if jitter_range > 0 {
        let offset = rand::thread_rng().gen_range(0..=jitter_range * 2);
        offset as i64 - jitter_range as i64
    } else {
        0
    };
    let floor = (base.as_millis() as i64).min(100);
    Duration::from_millis((base_ms as i64 + jitter).max(floor) as u64)
}

/// Parse a model completion as JSON, tolerating a Markdown code fence.
fn parse_json_output(raw: &str) -> Result<Value, String> {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        text = rest.trim().strip_suffix("```").unwrap_or(rest).trim();
    }
    if text.is_empty() {
        return Err("empty completion".to_string());
    }
    serde_json::from_str(text).map_err(|e| format!("invalid JSON: {}", e))
}
