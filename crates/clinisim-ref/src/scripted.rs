//! A deterministic `ChatModel` for offline runs and tests.
//!
//! `ScriptedModel` answers by graph node name, reading the clinician
//! utterance back out of the prompt so the simulated patient stays on topic.
//! Every request is recorded for inspection. Fixed raw answers can be forced
//! per node to exercise contract and safety failures.

use std::{
    collections::HashMap,
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use clinisim_contracts::{
    analysis::AnalysisFacet,
    error::{ClinisimError, ClinisimResult},
};
use clinisim_core::{
    generator::{CHIEF_COMPLAINT_NODE, GENERATE_PROFILE_NODE},
    nodes::{GENERATE_RESPONSE, GRADE, SCORE_TURN},
    safety,
    traits::{ChatModel, ChatRequest},
};

use crate::sample_data::sample_profile_value;

pub const SCRIPTED_MODEL_NAME: &str = "scripted-patient-v1";

#[derive(Default)]
pub struct ScriptedModel {
    forced: HashMap<String, String>,
    delay: Option<Duration>,
    log: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer `node` with `raw`, verbatim.
    pub fn with_raw(mut self, node: &str, raw: impl Into<String>) -> Self {
        self.forced.insert(node.to_string(), raw.into());
        self
    }

    /// Sleep before every answer, to widen race windows in tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn calls_to(&self, node: &str) -> usize {
        self.requests().iter().filter(|r| r.node == node).count()
    }

    fn answer(&self, request: &ChatRequest) -> ClinisimResult<Value> {
        let node = request.node.as_str();
        if let Some(facet) = AnalysisFacet::ALL.iter().find(|f| f.node_name() == node) {
            let utterance = quoted_after(&request.user, "Latest clinician utterance:\n\"").unwrap_or_default();
            return Ok(analysis(*facet, utterance));
        }
        match node {
            GENERATE_RESPONSE => {
                let utterance = quoted_after(&request.user, "Clinician now says: \"").unwrap_or_default();
                Ok(json!({ "patient_response": patient_reply(utterance) }))
            }
            SCORE_TURN => {
                let utterance = quoted_after(&request.user, "Clinician: \"").unwrap_or_default();
                Ok(score(utterance))
            }
            GRADE => Ok(grade(&request.user)),
            CHIEF_COMPLAINT_NODE => Ok(json!({
                "chief_complaint": "I can't sleep and nothing feels worth doing anymore."
            })),
            GENERATE_PROFILE_NODE => Ok(sample_profile_value()),
            other => Err(ClinisimError::Transport {
                reason: format!("no script for node '{}'", other),
                retryable: false,
            }),
        }
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn model_name(&self) -> &str {
        SCRIPTED_MODEL_NAME
    }

    async fn complete(&self, request: &ChatRequest) -> ClinisimResult<String> {
        if let Ok(mut log) = self.log.lock() {
            log.push(request.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        debug!(node = %request.node, "scripted completion");

        if let Some(raw) = self.forced.get(&request.node) {
            return Ok(raw.clone());
        }
        self.answer(request).map(|v| v.to_string())
    }
}

// ── Prompt reading ───────────────────────────────────────────────────────────

/// The text between `marker` and the closing quote that ends its line.
fn quoted_after<'a>(prompt: &'a str, marker: &str) -> Option<&'a str> {
    let start = prompt.find(marker)? + marker.len();
    let rest = &prompt[start..];
    let end = rest.find("\"\n").unwrap_or_else(|| rest.trim_end().trim_end_matches('"').len());
    Some(&rest[..end])
}

fn mentions(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| text.contains(n))
}

fn is_risk_question(lower: &str) -> bool {
    mentions(lower, &["suicid", "worth living", "better off", "end your life", "kill"])
}

// ── Scripted answers ─────────────────────────────────────────────────────────

fn analysis(facet: AnalysisFacet, utterance: &str) -> Value {
    let lower = utterance.to_lowercase();
    let critique = match facet {
        AnalysisFacet::Risk if !safety::detect_risk(utterance).is_empty() => {
            "The clinician raised self-harm directly. The patient endorses a passive death \
             wish with no plan or intent and names her daughter as a protective factor."
                .to_string()
        }
        AnalysisFacet::Risk => {
            "No risk content in this turn; risk has not been explored yet.".to_string()
        }
        AnalysisFacet::Symptoms if lower.contains("sleep") => {
            "Insomnia is spontaneously disclosed; describe early waking.".to_string()
        }
        AnalysisFacet::Symptoms if mentions(&lower, &["enjoy", "interest"]) => {
            "An open question about enjoyment earns disclosure of anhedonia.".to_string()
        }
        AnalysisFacet::InteractionStyle => {
            "Guarded and brief; warms up slightly to open, unhurried questions.".to_string()
        }
        AnalysisFacet::MentalStatus => {
            "Slow, quiet speech with long pauses; mood described as empty.".to_string()
        }
        _ => format!("{}: nothing in this question changes the presentation.", facet.node_name()),
    };
    json!({
        "critique": critique,
        "notes_for_context": { "facet": facet.profile_key() }
    })
}

fn patient_reply(utterance: &str) -> &'static str {
    let lower = utterance.to_lowercase();
    if mentions(&lower, &["energetic", "little sleep"]) {
        "No, nothing like that. I've never felt like that, not even close."
    } else if is_risk_question(&lower) {
        "Sometimes I think everyone would be better off without me. I haven't done anything, \
         and I wouldn't, because of my daughter."
    } else if lower.contains("sleep") {
        "I haven't been sleeping much. I fall asleep all right but I'm awake by three and just lie there."
    } else if mentions(&lower, &["enjoy", "interest", "fun"]) {
        "Honestly, nothing really. I used to garden with my daughter. Now I can't be bothered."
    } else if lower.contains("how long") {
        "About two months, I think. Since I lost my job."
    } else if mentions(&lower, &["sounds like", "hard", "help"]) {
        "I guess... just being able to sleep. And maybe talking to someone like this."
    } else {
        "I'm not sure. I just feel tired and empty most of the time."
    }
}

fn score(utterance: &str) -> Value {
    let lower = utterance.to_lowercase();
    let (score, critique) = if is_risk_question(&lower) {
        (20.0, "Direct, appropriate suicide risk screening.")
    } else if mentions(&lower, &["sounds like", "hard"]) {
        (15.0, "Empathic reflection before the next question.")
    } else if ["what", "how", "tell", "describe"].iter().any(|w| lower.starts_with(w)) {
        (12.0, "Open question relevant to the presenting complaint.")
    } else {
        (4.0, "Closed question with limited yield.")
    };
    json!({ "score": score, "critique": critique })
}

fn grade(prompt: &str) -> Value {
    let clinician_turns = prompt.lines().filter(|l| l.starts_with("Clinician: ")).count();
    let asked_risk = prompt
        .lines()
        .filter(|l| l.starts_with("Clinician: "))
        .any(|l| is_risk_question(&l.to_lowercase()));

    let mut grade = (55 + 5 * clinician_turns).min(92) as f64;
    let mut missed = vec!["substance use"];
    if asked_risk {
        grade = (grade + 3.0).min(95.0);
    } else {
        missed.push("suicidal ideation");
    }

    json!({
        "grade": grade,
        "interviewFeedback": {
            "strengths": ["open questions", "unhurried pacing"],
            "areasForImprovement": ["summarise before moving on"],
            "missedQuestions": missed
        },
        "correctedDiagnosis": {
            "studentDiagnosis": "Depression",
            "correctDiagnosis": "Major depressive disorder",
            "rationale": "Two months of low mood, anhedonia and early waking with functional impairment",
            "diagnosticCriteriaMissed": ["psychomotor change"]
        },
        "treatmentFeedback": {
            "studentTreatment": "Sleep hygiene advice",
            "issues": ["no antidepressant or psychotherapy offered"],
            "recommendedAlternatives": ["Sertraline", "Cognitive behavioural therapy"],
            "evidenceBasedRationale": "SSRIs and CBT are first line for a moderate episode"
        },
        "noteImprovementGuidance": "Record the risk assessment and protective factors explicitly."
    })
}
