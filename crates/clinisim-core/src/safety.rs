//! Content-safety screen for the interactive pipeline.
//!
//! Three pattern sets:
//!
//! - risk disclosure in the clinician utterance or the risk analysis
//! - escalation language in the risk critique
//! - actionable self-harm instructions in a synthesized reply
//!
//! When risk is present the risk critique must tell the clinician to
//! escalate. If the model left that out, `ESCALATION_NOTICE` is appended.
//! A reply matching an instruction pattern fails the turn.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    SelfHarm,
    HarmToOthers,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskSignal {
    pub category: RiskCategory,
    pub description: &'static str,
}

struct SafetyPattern {
    regex: Regex,
    category: RiskCategory,
    description: &'static str,
}

fn pattern(regex_str: &str, category: RiskCategory, description: &'static str) -> SafetyPattern {
    SafetyPattern {
        regex: Regex::new(regex_str).expect("invalid safety regex pattern"),
        category,
        description,
    }
}

/// Appended to a risk critique that lacks escalation language.
pub const ESCALATION_NOTICE: &str = "ESCALATE: the patient has disclosed risk of harm. \
Assess immediate safety now, do not end the encounter, and offer immediate help \
(crisis line or emergency services).";

static RISK_PATTERNS: LazyLock<Vec<SafetyPattern>> = LazyLock::new(|| {
    vec![
        pattern(
            r"(?i)\bsuicid(?:e|al)\b",
            RiskCategory::SelfHarm,
            "suicide mentioned",
        ),
        pattern(
            r"(?i)\b(?:kill(?:ing)?|hurt(?:ing)?|harm(?:ing)?|cut(?:ting)?)\s+(?:my|your|him|her|them)sel(?:f|ves)\b",
            RiskCategory::SelfHarm,
            "intent to harm oneself",
        ),
        pattern(
            r"(?i)\bend(?:ing)?\s+(?:my|your|it)\s+(?:life|all)\b",
            RiskCategory::SelfHarm,
            "ending one's life",
        ),
        pattern(
            r"(?i)\b(?:take|taking|end|ending)\s+(?:my|your|his|her|their)\s+own\s+life\b",
            RiskCategory::SelfHarm,
            "taking one's own life",
        ),
        pattern(
            r"(?i)\bbetter\s+off\s+(?:dead|without\s+me)\b",
            RiskCategory::SelfHarm,
            "better off dead",
        ),
        pattern(
            r"(?i)\bdeath\s+wish\b",
            RiskCategory::SelfHarm,
            "death wish",
        ),
        pattern(
            r"(?i)\b(?:want|wish|wanting|wishing)\s+(?:to\s+)?(?:be\s+)?(?:dead|die)\b",
            RiskCategory::SelfHarm,
            "death wish",
        ),
        pattern(
            r"(?i)\boverdos(?:e|ing)\b",
            RiskCategory::SelfHarm,
            "overdose",
        ),
        pattern(
            r"(?i)\bhomicid(?:e|al)\b",
            RiskCategory::HarmToOthers,
            "homicide mentioned",
        ),
        pattern(
            r"(?i)\b(?:kill|hurt|harm|shoot|stab)(?:ing)?\s+(?:him|her|them|others|other\s+people|anyone|anybody|someone|somebody|people|my\s+(?:wife|husband|partner|boss|family|kids|neighbou?r))\b",
            RiskCategory::HarmToOthers,
            "intent to harm others",
        ),
    ]
});

static ESCALATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bescalat",
        r"(?i)\b(?:crisis|emergency)\b",
        r"(?i)\b(?:988|911|999|112)\b",
        r"(?i)\bimmediate\s+(?:help|support|safety|assessment|intervention)\b",
        r"(?i)\bsafety\s+plan",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("invalid escalation regex pattern"))
    .collect()
});

static INSTRUCTION_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (
            r"(?i)\b(?:how\s+to|way\s+to|you\s+(?:can|could|should))\s+(?:kill|hurt|harm)\s+(?:your|my)self\b",
            "method to harm oneself",
        ),
        (r"(?i)\b(?:lethal|fatal)\s+dose\b", "lethal dose"),
        (
            r"(?i)\btake\s+(?:\d+|all|enough|a\s+(?:lot|bunch)\s+of)\s+(?:of\s+)?(?:\w+\s+){0,2}(?:pills|tablets|capsules)\b",
            "overdose instruction",
        ),
        (r"(?i)\b(?:tie|make)\s+a\s+noose\b", "hanging instruction"),
        (
            r"(?i)\bcut\s+(?:along|down|deep(?:er)?\s+into)\s+(?:the|your)\s+(?:veins?|wrists?|arms?)\b",
            "cutting instruction",
        ),
    ]
    .into_iter()
    .map(|(p, d)| (Regex::new(p).expect("invalid instruction regex pattern"), d))
    .collect()
});

/// Risk-of-harm signals in `text`, one per matching pattern.
pub fn detect_risk(text: &str) -> Vec<RiskSignal> {
    RISK_PATTERNS
        .iter()
        .filter(|p| p.regex.is_match(text))
        .map(|p| RiskSignal {
            category: p.category,
            description: p.description,
        })
        .collect()
}

pub fn contains_escalation(text: &str) -> bool {
    ESCALATION_PATTERNS.iter().any(|r| r.is_match(text))
}

/// The first actionable self-harm instruction found in `text`, if any.
pub fn find_self_harm_instruction(text: &str) -> Option<&'static str> {
    INSTRUCTION_PATTERNS
        .iter()
        .find(|(r, _)| r.is_match(text))
        .map(|(_, d)| *d)
}

/// Make sure `critique` instructs escalation. Returns true if the notice was
/// appended.
pub fn enforce_escalation(critique: &mut String) -> bool {
    if contains_escalation(critique) {
        return false;
    }
    if !critique.trim().is_empty() {
        critique.push(' ');
    }
    critique.push_str(ESCALATION_NOTICE);
    true
}
