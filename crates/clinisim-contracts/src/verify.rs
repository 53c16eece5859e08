//! Output contracts for model calls.
//!
//! Every model call declares the shape its answer must take. The gateway
//! runs the raw JSON against an `OutputSchema` and only a passing
//! `VerificationReport` lets the value be deserialized into the node's
//! typed output.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A declared output shape: a JSON Schema document plus rules JSON Schema
/// cannot express on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSchema {
    /// Contract identifier, e.g. "patient-reply-v1". Appears in
    /// `SchemaViolation` errors.
    pub schema_id: String,
    pub json_schema: Value,
    pub rules: Vec<VerificationRule>,
}

impl OutputSchema {
    pub fn new(schema_id: impl Into<String>, json_schema: Value) -> Self {
        Self {
            schema_id: schema_id.into(),
            json_schema,
            rules: Vec::new(),
        }
    }

    pub fn with_rule(
        mut self,
        rule_id: impl Into<String>,
        description: impl Into<String>,
        rule_type: VerificationRuleType,
    ) -> Self {
        self.rules.push(VerificationRule {
            rule_id: rule_id.into(),
            description: description.into(),
            rule_type,
        });
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRule {
    /// Referenced in failure reports.
    pub rule_id: String,
    pub description: String,
    pub rule_type: VerificationRuleType,
}

/// Semantic checks applied after structural validation.
///
/// Field paths are dotted (`"interviewFeedback.strengths"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VerificationRuleType {
    /// Present and non-null.
    RequiredField { field_path: String },

    /// Must equal one of `allowed`.
    AllowedValues {
        field_path: String,
        allowed: Vec<Value>,
    },

    /// A number within `[min, max]`, inclusive.
    NumericRange {
        field_path: String,
        min: f64,
        max: f64,
    },

    /// A string with at least one non-whitespace character.
    NonEmptyString { field_path: String },

    /// A string field must not match `pattern`. Matching is a
    /// case-insensitive regex; an invalid regex falls back to substring.
    ForbiddenPattern { field_path: String, pattern: String },

    /// A named check registered with the verifier by the hosting application.
    Custom { function_name: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    /// True only if all rules passed.
    pub passed: bool,
    pub failures: Vec<VerificationFailure>,
}

impl VerificationReport {
    /// Failure messages joined into one line, for error payloads and logs.
    pub fn summary(&self) -> String {
        self.failures
            .iter()
            .map(|f| format!("[{}] {}", f.rule_id, f.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationFailure {
    pub rule_id: String,
    pub message: String,
}
