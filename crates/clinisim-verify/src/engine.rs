//! Schema-based output verifier.
//!
//! `SchemaVerifier` implements the `Verifier` trait from `clinisim-core`.
//! Verification runs in two phases:
//!
//! 1. **Structural**: the raw model output is validated against the
//!    `OutputSchema::json_schema` document using the `jsonschema` crate.
//! 2. **Semantic**: each `VerificationRule` in `OutputSchema::rules` is
//!    evaluated in order. All failures are collected before returning so the
//!    caller sees the full failure set in one pass.
//!
//! Custom rules delegate to named functions registered via `register_rule`.

use std::collections::HashMap;

use regex::RegexBuilder;
use serde_json::Value;
use tracing::{debug, warn};

use clinisim_contracts::{
    error::ClinisimResult,
    verify::{OutputSchema, VerificationFailure, VerificationReport, VerificationRuleType},
};
use clinisim_core::{safety, traits::Verifier};

/// A caller-supplied verification function.
///
/// Receives the full model output. Returns `Some(message)` when the check
/// fails, or `None` on success.
pub type CustomVerifierFn = Box<dyn Fn(&Value) -> Option<String> + Send + Sync>;

/// Name of the built-in custom rule that rejects any string in the output
/// carrying self-harm method or instruction content.
pub const NO_SELF_HARM_INSTRUCTIONS: &str = "no_self_harm_instructions";

pub struct SchemaVerifier {
    custom_rules: HashMap<String, CustomVerifierFn>,
}

impl SchemaVerifier {
    /// Create a verifier with no custom rules registered.
    pub fn new() -> Self {
        Self {
            custom_rules: HashMap::new(),
        }
    }

    /// A verifier with the clinical content rules pre-registered.
    pub fn clinical() -> Self {
        let mut verifier = Self::new();
        verifier.register_rule(NO_SELF_HARM_INSTRUCTIONS, Box::new(no_self_harm_instructions));
        verifier
    }

    /// Register a custom verification function under `name`.
    ///
    /// The name must match the `function_name` used in
    /// `VerificationRuleType::Custom` rules. Registering the same name twice
    /// replaces the previous function.
    pub fn register_rule(&mut self, name: impl Into<String>, f: CustomVerifierFn) {
        self.custom_rules.insert(name.into(), f);
    }

    // ── Internal helpers ──────────────────────────────────────────────────────

    /// Resolve a dotted path (`"correctedDiagnosis.correctDiagnosis"`)
    /// against a JSON value. `None` when any segment is missing or null.
    fn resolve_path<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
        let mut current = value;
        for segment in path.split('.') {
            match current.get(segment) {
                Some(v) if !v.is_null() => current = v,
                _ => return None,
            }
        }
        Some(current)
    }

    fn matches_forbidden(text: &str, pattern: &str) -> bool {
        match RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(re) => re.is_match(text),
            Err(_) => text.to_lowercase().contains(&pattern.to_lowercase()),
        }
    }

    fn check_rule(&self, payload: &Value, rule_type: &VerificationRuleType) -> Option<String> {
        match rule_type {
            VerificationRuleType::RequiredField { field_path } => {
                if Self::resolve_path(payload, field_path).is_none() {
                    Some(format!("required field '{field_path}' is missing or null"))
                } else {
                    None
                }
            }

            VerificationRuleType::AllowedValues { field_path, allowed } => {
                match Self::resolve_path(payload, field_path) {
                    None => Some(format!(
                        "field '{field_path}' is missing; cannot check allowed values"
                    )),
                    Some(actual) if allowed.contains(actual) => None,
                    Some(actual) => Some(format!(
                        "field '{field_path}' has value {actual} which is not in the allowed set"
                    )),
                }
            }

            VerificationRuleType::NumericRange { field_path, min, max } => {
                match Self::resolve_path(payload, field_path).map(Value::as_f64) {
                    None => Some(format!("numeric field '{field_path}' is missing")),
                    Some(None) => Some(format!("field '{field_path}' is not a number")),
                    Some(Some(n)) if n < *min || n > *max => Some(format!(
                        "field '{field_path}' = {n} is outside [{min}, {max}]"
                    )),
                    Some(Some(_)) => None,
                }
            }

            VerificationRuleType::NonEmptyString { field_path } => {
                match Self::resolve_path(payload, field_path).and_then(Value::as_str) {
                    Some(s) if !s.trim().is_empty() => None,
                    Some(_) => Some(format!("field '{field_path}' is blank")),
                    None => Some(format!("field '{field_path}' is missing or not a string")),
                }
            }

            // Absent or non-string fields pass: the rule only constrains text.
            VerificationRuleType::ForbiddenPattern { field_path, pattern } => {
                match Self::resolve_path(payload, field_path).and_then(Value::as_str) {
                    Some(s) if Self::matches_forbidden(s, pattern) => Some(format!(
                        "field '{field_path}' contains forbidden pattern '{pattern}'"
                    )),
                    _ => None,
                }
            }

            // An unregistered name is itself a failure.
            VerificationRuleType::Custom { function_name } => {
                match self.custom_rules.get(function_name.as_str()) {
                    Some(f) => f(payload),
                    None => Some(format!(
                        "no custom rule registered for function name '{function_name}'"
                    )),
                }
            }
        }
    }
}

impl Default for SchemaVerifier {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_strings<'v>(value: &'v Value, out: &mut Vec<&'v str>) {
    match value {
        Value::String(s) => out.push(s),
        Value::Array(items) => items.iter().for_each(|v| collect_strings(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_strings(v, out)),
        _ => {}
    }
}

fn no_self_harm_instructions(payload: &Value) -> Option<String> {
    let mut strings = Vec::new();
    collect_strings(payload, &mut strings);
    strings
        .into_iter()
        .find_map(safety::find_self_harm_instruction)
        .map(|label| format!("output contains self-harm instruction content ({label})"))
}

impl Verifier for SchemaVerifier {
    /// Verify `output` against `schema`, accumulating every failure.
    fn verify(&self, output: &Value, schema: &OutputSchema) -> ClinisimResult<VerificationReport> {
        let mut failures: Vec<VerificationFailure> = Vec::new();

        // ── Phase 1: JSON Schema structural validation ────────────────────────
        // A null json_schema means no structural constraint.
        if !schema.json_schema.is_null() {
            match jsonschema::validator_for(&schema.json_schema) {
                Ok(validator) => {
                    for error in validator.iter_errors(output) {
                        let message = format!(
                            "JSON Schema violation at {}: {}",
                            error.instance_path, error
                        );
                        warn!(schema_id = %schema.schema_id, %message, "structural validation failure");
                        failures.push(VerificationFailure {
                            rule_id: "json-schema".to_string(),
                            message,
                        });
                    }
                }
                Err(e) => {
                    let message = format!("invalid JSON Schema document: {e}");
                    warn!(schema_id = %schema.schema_id, %message, "schema compilation failure");
                    failures.push(VerificationFailure {
                        rule_id: "json-schema".to_string(),
                        message,
                    });
                }
            }
        }

        // ── Phase 2: Semantic rule evaluation ────────────────────────────────
        for rule in &schema.rules {
            debug!(rule_id = %rule.rule_id, description = %rule.description, "evaluating verification rule");

            if let Some(message) = self.check_rule(output, &rule.rule_type) {
                warn!(rule_id = %rule.rule_id, %message, "semantic rule failed");
                failures.push(VerificationFailure {
                    rule_id: rule.rule_id.clone(),
                    message,
                });
            }
        }

        let passed = failures.is_empty();
        debug!(
            schema_id = %schema.schema_id,
            passed,
            failure_count = failures.len(),
            "verification complete"
        );

        Ok(VerificationReport { passed, failures })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
